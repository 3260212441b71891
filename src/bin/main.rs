// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

use booking_engine_rs::allocation::{AllocationInput, RemainingMethod, allocate};
use booking_engine_rs::{
    BogoMode, Checkout, CostBreakdown, EngineConfig, MemberCheckout, OfferConfig, format_money,
    telemetry,
};
use clap::Parser;
use csv::{ReaderBuilder, Trim, Writer};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::PathBuf;
use std::process;
use tracing::{info, warn};

/// Booking quote calculator
///
/// Reads pricing scenarios from a CSV file and writes the cost breakdown and
/// funding allocation of each one to stdout.
#[derive(Parser, Debug)]
#[command(name = "booking-engine-rs")]
#[command(about = "Prices booking scenarios and allocates vouchers and training fund", long_about = None)]
struct Args {
    /// Path to CSV file with scenarios
    ///
    /// Expected format: base_price,offer,buy,free,mode,threshold,percentage,tickets,vouchers,training_fund
    /// Example: cargo run -- scenarios.csv > quotes.csv
    #[arg(value_name = "FILE")]
    input: PathBuf,
}

fn main() {
    let args = Args::parse();

    let config = match EngineConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid configuration: {}", e);
            process::exit(1);
        }
    };
    telemetry::init(&config.log_filter);

    let file = match File::open(&args.input) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Error opening file '{}': {}", args.input.display(), e);
            process::exit(1);
        }
    };

    let quotes = match process_scenarios(BufReader::new(file)) {
        Ok(quotes) => quotes,
        Err(e) => {
            eprintln!("Error reading scenarios: {}", e);
            process::exit(1);
        }
    };
    info!(count = quotes.len(), "priced scenarios");

    if let Err(e) = write_quotes(&quotes, std::io::stdout()) {
        eprintln!("Error writing output: {}", e);
        process::exit(1);
    }
}

/// Raw CSV record matching the input format.
///
/// Offer columns that do not apply to the row's offer may be left empty.
#[derive(Debug, Deserialize)]
struct ScenarioRecord {
    base_price: Decimal,
    offer: String,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    buy: Option<u32>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    free: Option<u32>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    mode: Option<String>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    threshold: Option<u32>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    percentage: Option<Decimal>,
    tickets: u32,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    vouchers: Option<Decimal>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    training_fund: Option<Decimal>,
}

impl ScenarioRecord {
    /// Returns `None` for an unknown offer type or missing offer fields.
    fn offer(&self) -> Option<OfferConfig> {
        match self.offer.to_lowercase().as_str() {
            "" | "none" => Some(OfferConfig::None),
            "bogo" => {
                let mode = match self.mode.as_deref().map(str::to_lowercase).as_deref() {
                    None | Some("enter_total_pay_less") => BogoMode::EnterTotalPayLess,
                    Some("buy_x_get_y_free") => BogoMode::BuyXGetYFree,
                    Some(_) => return None,
                };
                Some(OfferConfig::Bogo {
                    buy_quantity: self.buy?,
                    free_quantity: self.free?,
                    mode,
                })
            }
            "bulk" | "bulk_discount" => Some(OfferConfig::BulkDiscount {
                threshold_quantity: self.threshold?,
                percentage: self.percentage?,
            }),
            _ => None,
        }
    }
}

/// One priced scenario.
#[derive(Debug, Serialize)]
struct Quote {
    row: usize,
    tickets: u32,
    payable: u32,
    free: u32,
    discount: String,
    description: String,
    total: String,
    voucher_applied: String,
    training_fund_applied: String,
    remaining: String,
    method: RemainingMethod,
}

impl Quote {
    fn price(row: usize, record: &ScenarioRecord, offer: &OfferConfig, booker: &Checkout) -> Self {
        let breakdown = CostBreakdown::compute(record.base_price, offer, record.tickets);
        let allocation = allocate(
            &AllocationInput {
                total_cost: breakdown.total_cost,
                selected_voucher_value: record.vouchers.unwrap_or_default(),
                training_fund_balance: record.training_fund.unwrap_or_default(),
                ..AllocationInput::default()
            },
            booker,
        );
        Quote {
            row,
            tickets: breakdown.tickets_required,
            payable: breakdown.payable_quantity,
            free: breakdown.free_quantity,
            discount: format_money(breakdown.discount_amount),
            description: breakdown.discount_description,
            total: format_money(breakdown.total_cost),
            voucher_applied: format_money(allocation.voucher_applied),
            training_fund_applied: format_money(allocation.training_fund_applied),
            remaining: format_money(allocation.remaining_balance),
            method: allocation.remaining_method,
        }
    }
}

/// Prices every scenario in a CSV reader.
///
/// Rows are numbered from 1 after the header. Malformed rows and rows with an
/// incomplete offer are logged and skipped.
///
/// # Errors
///
/// Returns a CSV error if the reader itself fails.
fn process_scenarios<R: Read>(reader: R) -> Result<Vec<Quote>, csv::Error> {
    let booker = Checkout::Member(MemberCheckout {
        member_id: "cli".into(),
        organization_id: "cli".into(),
        email: "cli@localhost".into(),
        roles: Default::default(),
    });

    let mut rdr = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .has_headers(true)
        .from_reader(reader);

    let mut quotes = Vec::new();
    for (index, result) in rdr.deserialize::<ScenarioRecord>().enumerate() {
        let row = index + 1;
        let record = match result {
            Ok(record) => record,
            Err(e) if e.is_io_error() => return Err(e),
            Err(e) => {
                warn!(row, error = %e, "skipping malformed row");
                continue;
            }
        };
        let Some(offer) = record.offer() else {
            warn!(row, offer = %record.offer, "skipping row with incomplete offer");
            continue;
        };
        quotes.push(Quote::price(row, &record, &offer, &booker));
    }
    Ok(quotes)
}

/// Writes quotes as CSV with two decimal places.
///
/// # Errors
///
/// Returns a CSV error if writing fails.
fn write_quotes<W: Write>(quotes: &[Quote], writer: W) -> Result<(), csv::Error> {
    let mut wtr = Writer::from_writer(writer);
    for quote in quotes {
        wtr.serialize(quote)?;
    }
    wtr.flush()?;
    Ok(())
}
