use async_trait::async_trait;
use std::io::{self, Stdout, Write};
use std::sync::Mutex;

use super::ResultSink;
use crate::models::{CycleResult, DeliveryCode};
use crate::utils::error::{AppError, Result};

const PRODUCT_WIDTH: usize = 50;
const PRICE_WIDTH: usize = 10;
const CODE_WIDTH: usize = 12;

/// Bordered table: header at the start of every cycle, one row per product.
pub struct ConsoleTable<W: Write + Send = Stdout> {
    out: Mutex<TableState<W>>,
}

struct TableState<W> {
    writer: W,
    code_widths: Vec<usize>,
}

impl ConsoleTable<Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> ConsoleTable<W> {
    pub fn new(writer: W) -> Self {
        Self {
            out: Mutex::new(TableState {
                writer,
                code_widths: Vec::new(),
            }),
        }
    }

    pub fn into_inner(self) -> W {
        match self.out.into_inner() {
            Ok(state) => state.writer,
            Err(poisoned) => poisoned.into_inner().writer,
        }
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut TableState<W>) -> io::Result<T>) -> Result<T> {
        let mut state = self
            .out
            .lock()
            .map_err(|_| AppError::Internal("console table lock poisoned".into()))?;
        Ok(f(&mut state)?)
    }
}

fn format_row(product: &str, price: &str, cells: &[&str], code_widths: &[usize], align_price_right: bool) -> String {
    let mut row = format!("| {:<width$} ", product, width = PRODUCT_WIDTH);
    if align_price_right {
        row.push_str(&format!("| {:>width$} ", price, width = PRICE_WIDTH));
    } else {
        row.push_str(&format!("| {:<width$} ", price, width = PRICE_WIDTH));
    }
    for (cell, width) in cells.iter().zip(code_widths) {
        row.push_str(&format!("| {:<width$} ", cell, width = *width));
    }
    row.push('|');
    row
}

#[async_trait]
impl<W: Write + Send + 'static> ResultSink for ConsoleTable<W> {
    fn name(&self) -> &str {
        "console"
    }

    async fn cycle_started(&self, _cycle: u32, codes: &[DeliveryCode]) -> Result<()> {
        self.with_state(|state| {
            state.code_widths = codes.iter().map(|c| c.as_str().len().max(CODE_WIDTH)).collect();
            let headers: Vec<&str> = codes.iter().map(|c| c.as_str()).collect();
            let header = format_row("Product", "Price", &headers, &state.code_widths, false);
            let separator = "-".repeat(header.chars().count());

            writeln!(state.writer, "{}", separator)?;
            writeln!(state.writer, "{}", header)?;
            writeln!(state.writer, "{}", separator)?;
            state.writer.flush()
        })
    }

    async fn record(&self, result: &CycleResult) -> Result<()> {
        self.with_state(|state| {
            if state.code_widths.len() != result.per_code.len() {
                state.code_widths = result
                    .per_code
                    .keys()
                    .map(|c| c.as_str().len().max(CODE_WIDTH))
                    .collect();
            }
            let cells: Vec<&str> = result.per_code.values().map(|s| s.label()).collect();
            let row = format_row(&result.product.name, &result.product.price, &cells, &state.code_widths, true);

            writeln!(state.writer, "{}", row)?;
            writeln!(state.writer, "{}", "-".repeat(row.chars().count()))?;
            state.writer.flush()
        })
    }
}
