//! Inertia compensation for rotation commands.
//!
//! `thresholds[i]` is the number of requested steps after which the dome
//! has really advanced `i` steps under load.

use crate::error::ScopeDomeResult;
use regex::Regex;
use std::path::Path;

const TABLE_LINE: &str = r"^\s*(-?\d+)\s*;\s*(-?\d+)";
const UTF8_BOM: char = '\u{feff}';

#[derive(Debug, Clone, Default, PartialEq)]
pub struct InertiaTable {
    thresholds: Vec<u32>,
}

impl InertiaTable {
    pub fn new(thresholds: Vec<u32>) -> InertiaTable {
        InertiaTable { thresholds }
    }

    pub fn load(path: &Path) -> ScopeDomeResult<InertiaTable> {
        let text = std::fs::read_to_string(path)?;
        let table = InertiaTable::parse(&text)?;
        log::info!(
            "Read inertia file {} with {} entries.",
            path.display(),
            table.len()
        );
        Ok(table)
    }

    /// Parse `index;steps` lines, with or without a space before the separator.
    ///
    /// Lines that do not parse, or whose index is not the next one
    /// expected, are skipped.
    pub fn parse(text: &str) -> ScopeDomeResult<InertiaTable> {
        let line_regex = Regex::new(TABLE_LINE)?;
        let mut thresholds = Vec::new();

        for line in text.trim_start_matches(UTF8_BOM).lines() {
            let Some(capture) = line_regex.captures(line) else {
                continue;
            };
            let (Ok(index), Ok(steps)) = (capture[1].parse::<i64>(), capture[2].parse::<i64>())
            else {
                continue;
            };
            if index != thresholds.len() as i64 {
                log::debug!("Skipping inertia line {line:?}: expected index {}.", thresholds.len());
                continue;
            }
            match u32::try_from(steps) {
                Ok(steps) => thresholds.push(steps),
                Err(_) => log::debug!("Skipping inertia line {line:?}: negative step count."),
            }
        }
        Ok(InertiaTable { thresholds })
    }

    pub fn len(&self) -> usize {
        self.thresholds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.thresholds.is_empty()
    }

    pub fn is_monotonic(&self) -> bool {
        self.thresholds.windows(2).all(|pair| pair[0] <= pair[1])
    }

    /// Convert a requested step count into the count to command.
    pub fn compensate(&self, steps: u16) -> u16 {
        if self.thresholds.is_empty() {
            log::debug!("Inertia passthrough {steps}.");
            return steps;
        }

        if let Some(index) = self
            .thresholds
            .iter()
            .position(|threshold| *threshold > steps as u32)
        {
            // A request below the very first threshold clamps to zero.
            let movement = index.saturating_sub(1) as u16;
            log::debug!("Inertia {steps} -> {movement}.");
            return movement;
        }

        // Past the calibrated range assume the last known overhead holds.
        let last_index = self.thresholds.len() - 1;
        let residual_inertia = self.thresholds[last_index] as i64 - last_index as i64;
        let movement = steps as i64 - residual_inertia;
        log::debug!("Inertia {steps} -> {movement} (extrapolated).");
        movement.clamp(0, u16::MAX as i64) as u16
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_table_is_identity() {
        let table = InertiaTable::default();

        for steps in [0u16, 1, 99, 1000, u16::MAX] {
            assert_eq!(table.compensate(steps), steps);
        }
    }

    #[test]
    fn test_compensate_inside_table() {
        let table = InertiaTable::new(vec![0, 5, 12, 20]);

        // First threshold above 8 is 12 at index 2. Indices count real
        // steps from zero, so one real step fits under a request of 8.
        assert_eq!(table.compensate(8), 1);
        assert_eq!(table.compensate(0), 0);
        assert_eq!(table.compensate(5), 1);
        assert_eq!(table.compensate(19), 2);
    }

    #[test]
    fn test_compensate_below_first_threshold_clamps() {
        let table = InertiaTable::new(vec![10, 15, 18]);

        assert_eq!(table.compensate(3), 0);
    }

    #[test]
    fn test_compensate_extrapolates() {
        let table = InertiaTable::new(vec![0, 5, 12, 20]);

        // Residual inertia is 20 - 3 = 17.
        assert_eq!(table.compensate(20), 3);
        assert_eq!(table.compensate(117), 100);
    }

    #[test]
    fn test_extrapolation_clamps_at_zero() {
        let table = InertiaTable::new(vec![40]);

        assert_eq!(table.compensate(40), 0);
        assert_eq!(table.compensate(45), 5);
    }

    #[test]
    fn test_compensate_is_monotonic() {
        let table = InertiaTable::new(vec![0, 3, 9, 14, 22, 25, 31]);
        assert!(table.is_monotonic());

        let mut previous = 0;
        for steps in 0..200u16 {
            let movement = table.compensate(steps);
            assert!(movement >= previous, "{steps} -> {movement} < {previous}");
            previous = movement;
        }
    }

    #[test]
    fn test_parse_both_separators() {
        let text = "\u{feff}0 ;0\n1;5\n2 ; 12\n3;20\n";

        let table = InertiaTable::parse(text).unwrap();

        assert_eq!(table, InertiaTable::new(vec![0, 5, 12, 20]));
    }

    #[test]
    fn test_parse_skips_malformed_and_out_of_order() {
        let text = "steps;result\n0;0\ngarbage\n1;4\n3;9\n2;7\n";

        let table = InertiaTable::parse(text).unwrap();

        assert_eq!(table, InertiaTable::new(vec![0, 4, 7]));
    }

    #[test]
    fn test_load_missing_file() {
        assert!(InertiaTable::load(Path::new("/nonexistent/inertia.txt")).is_err());
    }
}
