use std::fmt::Write as _;

use super::Memory;

const UNITS_PER_ROW: usize = 8;

const fn hex_digits(bits: u32) -> usize {
    ((bits - 1) / 4 + 1) as usize
}

impl Memory {
    /// Formats units `start..=end` as a table of eight units per row.
    ///
    /// Each row begins with the address of its first unit. Printing stops
    /// at the first address past the maximum address.
    #[must_use]
    pub fn dump(&self, start: u64, end: u64) -> String {
        let address_width = hex_digits(self.geometry().address_bits);
        let data_width = hex_digits(self.geometry().unit_bits);
        let mut out = String::from("MEMORY DUMP\n-----------\n");
        for (column, address) in (start..=end).enumerate() {
            if column % UNITS_PER_ROW == 0 {
                if column > 0 {
                    out.push('\n');
                }
                let _ = write!(out, "{address:0address_width$x}");
            }
            match self.peek(address) {
                Some(unit) => {
                    let _ = write!(out, " {unit:0data_width$x}");
                }
                None => {
                    out.push_str(" XXXXXXX out of range");
                    break;
                }
            }
        }
        if start <= end {
            out.push('\n');
        }
        out
    }

    /// Formats units `start..=end` on one line as `value/` cells.
    ///
    /// An address past the maximum prints as `XXXXXX` and ends the line.
    #[must_use]
    pub fn dump_lite(&self, start: u64, end: u64) -> String {
        let data_width = hex_digits(self.geometry().unit_bits);
        let mut out = String::new();
        for address in start..=end {
            match self.peek(address) {
                Some(unit) => {
                    let _ = write!(out, " {unit:0data_width$x}/");
                }
                None => {
                    out.push_str(" XXXXXX");
                    break;
                }
            }
        }
        out
    }
}
