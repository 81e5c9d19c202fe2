//! # Generic Symbol Matcher
//!
//! Shared decode and encode steps used by every protocol.
//!
//! ## Decoding
//!
//! A received frame ends with the footer pair. The matcher looks at the
//! trailing `num_symbols · pulses_per_symbol + 2` pulses only:
//!
//! ```text
//! ... noise | s0 s0 s0 s0 | s1 s1 s1 s1 | ... | sN sN sN sN | footer sep
//!           ^ window start (first pulse never matched)
//! ```
//!
//! The timebase is estimated from the leading symbols when the protocol
//! allows it, then every pulse is checked against a tolerance window
//! `nominal·(q-1)/q ..= nominal·(q+1)/q` of its shape.

use tracing::trace;

use super::{CodecParams, Symbols, FOOTER_LEN, TICK_US};

/// Upper bound on `shapes × pulses_per_symbol` of any protocol
pub const MAX_TABLE_PULSES: usize = 16;

/// Per-(shape, pulse) matching windows in sample ticks, inclusive
#[derive(Debug, Clone)]
pub struct MatchTable {
    bounds: [(u16, u16); MAX_TABLE_PULSES],
    shapes: usize,
    pulses_per_symbol: usize,
}

impl MatchTable {
    /// Build windows for every shape at the given timebase (µs)
    pub fn new(params: &CodecParams, timebase: u32) -> Self {
        let pulses_per_symbol = params.pulses_per_symbol as usize;
        let shapes = params
            .num_shapes()
            .min(MAX_TABLE_PULSES / pulses_per_symbol.max(1));
        let q = params.quality.max(1) as u32;
        let divisor = q * TICK_US;

        let mut bounds = [(0u16, 0u16); MAX_TABLE_PULSES];
        for (s, widths) in params.shapes.iter().take(shapes).enumerate() {
            for (p, &width) in widths.iter().take(pulses_per_symbol).enumerate() {
                let nominal = timebase * width as u32;
                let low = nominal * (q - 1) / divisor;
                let high = (nominal * (q + 1)).div_ceil(divisor);
                bounds[s * pulses_per_symbol + p] = (clamp_u16(low), clamp_u16(high));
            }
        }

        Self {
            bounds,
            shapes,
            pulses_per_symbol,
        }
    }

    /// Window of pulse `pulse` of shape `shape`
    pub fn bounds(&self, shape: usize, pulse: usize) -> (u16, u16) {
        self.bounds[shape * self.pulses_per_symbol + pulse]
    }

    /// First shape whose pulses all fit, ignoring the first `skip` pulses
    pub fn find_shape(&self, chunk: &[u8], skip: usize) -> Option<u8> {
        (0..self.shapes)
            .find(|&shape| {
                chunk.iter().enumerate().skip(skip).all(|(p, &pulse)| {
                    let (low, high) = self.bounds(shape, p);
                    (low..=high).contains(&(pulse as u16))
                })
            })
            .map(|shape| shape as u8)
    }
}

fn clamp_u16(value: u32) -> u16 {
    value.min(u16::MAX as u32) as u16
}

/// Estimate or pick the timebase for a frame window
///
/// # Returns
///
/// * `Option<u32>` - Timebase in µs; the nominal one when estimation is
///   disabled, `None` when the estimate is outside the protocol's bounds
pub fn resolve_timebase(params: &CodecParams, window: &[u8]) -> Option<u32> {
    if params.auto_timebase_symbols == 0 {
        return Some(params.timebase as u32);
    }

    let count = params.auto_timebase_symbols as usize * params.pulses_per_symbol as usize;
    let sum: u32 = window.iter().take(count).map(|&p| p as u32).sum();
    let unit = params.shape_width(0);
    if unit == 0 {
        return None;
    }

    let timebase = sum * TICK_US / params.auto_timebase_symbols as u32 / unit;
    if timebase < params.timebase_min as u32 || timebase > params.timebase_max as u32 {
        trace!(timebase, "estimated timebase out of range");
        return None;
    }
    Some(timebase)
}

/// Greedily match whole symbols from `pulses` into `out`
///
/// Stops at the first chunk no shape matches. With `skip_first` the very
/// first pulse of `pulses` is not checked. Returns the number of matched
/// symbols.
pub fn match_symbols(table: &MatchTable, pulses: &[u8], skip_first: bool, out: &mut Symbols) -> usize {
    let mut matched = 0;
    for (i, chunk) in pulses.chunks_exact(table.pulses_per_symbol).enumerate() {
        let skip = usize::from(skip_first && i == 0);
        match table.find_shape(chunk, skip) {
            Some(shape) => {
                out.push(shape);
                matched += 1;
            }
            None => break,
        }
    }
    matched
}

/// Generic frame decode
///
/// # Arguments
///
/// * `params` - Timing and shape descriptor of the protocol
/// * `pulses` - Received frame in ticks, ending with the footer pair
///
/// # Returns
///
/// * `Option<Symbols>` - Exactly `num_symbols` symbols, or `None` if the
///   frame is too short, the estimated timebase is out of range, or a pulse
///   falls outside every window
pub fn decode(params: &CodecParams, pulses: &[u8]) -> Option<Symbols> {
    let frame_len = params.frame_pulses() + FOOTER_LEN;
    if pulses.len() < frame_len {
        return None;
    }

    let window = &pulses[pulses.len() - frame_len..];
    let timebase = resolve_timebase(params, window)?;
    let table = MatchTable::new(params, timebase);

    let mut symbols = Symbols::new();
    let matched = match_symbols(&table, window, true, &mut symbols);
    trace!(matched, expected = params.num_symbols, "symbol match");

    (matched == params.num_symbols as usize).then_some(symbols)
}

/// Width of one shape pulse in ticks, rounded
pub fn pulse_ticks(timebase: u32, width: u8) -> u8 {
    let ticks = (timebase * width as u32 + TICK_US / 2) / TICK_US;
    ticks.min(u8::MAX as u32) as u8
}

/// Generic frame encode at the nominal timebase
pub fn encode(params: &CodecParams, symbols: &Symbols) -> Vec<u8> {
    let mut pulses = Vec::with_capacity(symbols.len() * params.pulses_per_symbol as usize);
    for &symbol in symbols.iter() {
        if let Some(widths) = params.shapes.get(symbol as usize) {
            pulses.extend(widths.iter().map(|&w| pulse_ticks(params.timebase as u32, w)));
        }
    }
    pulses
}

#[cfg(test)]
mod tests {
    use super::*;

    static TEST_PARAMS: CodecParams = CodecParams {
        timebase: 500,
        timebase_min: 400,
        timebase_max: 600,
        num_symbols: 2,
        auto_timebase_symbols: 0,
        pulses_per_symbol: 2,
        quality: 4,
        footer: crate::codec::STANDARD_FOOTER,
        tx_repeats: 1,
        shapes: &[&[1, 2], &[2, 1]],
    };

    fn frame_with(pulse: u8) -> Vec<u8> {
        // first symbol only has its second pulse checked
        vec![10, 20, pulse, 20, 5, 120]
    }

    #[test]
    fn test_window_bounds() {
        let table = MatchTable::new(&TEST_PARAMS, 500);
        // 500µs·3/4 = 375µs = 7.5 ticks -> 7, 500µs·5/4 = 625µs = 12.5 ticks -> 13
        assert_eq!(table.bounds(0, 0), (7, 13));
        assert_eq!(table.bounds(0, 1), (15, 25));
        assert_eq!(table.bounds(1, 0), (15, 25));
        assert_eq!(table.bounds(1, 1), (7, 13));
    }

    #[test]
    fn test_pulse_at_low_bound_matches() {
        let symbols = decode(&TEST_PARAMS, &frame_with(7)).expect("low bound should match");
        assert_eq!(symbols.as_slice(), &[0, 0]);
    }

    #[test]
    fn test_pulse_at_high_bound_matches() {
        let symbols = decode(&TEST_PARAMS, &frame_with(13)).expect("high bound should match");
        assert_eq!(symbols.as_slice(), &[0, 0]);
    }

    #[test]
    fn test_pulse_below_low_bound_fails() {
        assert!(decode(&TEST_PARAMS, &frame_with(6)).is_none());
    }

    #[test]
    fn test_pulse_above_high_bound_fails() {
        assert!(decode(&TEST_PARAMS, &frame_with(14)).is_none());
    }

    #[test]
    fn test_first_pulse_is_ignored() {
        let mut frame = frame_with(10);
        frame[0] = 255;
        assert!(decode(&TEST_PARAMS, &frame).is_some());
    }

    #[test]
    fn test_too_few_pulses() {
        assert!(decode(&TEST_PARAMS, &[10, 20, 10, 20, 5]).is_none());
        assert!(decode(&TEST_PARAMS, &[]).is_none());
    }

    #[test]
    fn test_leading_noise_is_outside_window() {
        let mut frame = vec![99, 3, 250];
        frame.extend(frame_with(10));
        assert!(decode(&TEST_PARAMS, &frame).is_some());
    }

    #[test]
    fn test_first_matching_shape_wins() {
        let table = MatchTable::new(&TEST_PARAMS, 500);
        assert_eq!(table.find_shape(&[20, 10], 0), Some(1));
        assert_eq!(table.find_shape(&[10, 20], 0), Some(0));
        assert_eq!(table.find_shape(&[30, 30], 0), None);
        assert_eq!(table.find_shape(&[30, 20], 1), Some(0));
    }

    #[test]
    fn test_encode_rounds_to_ticks() {
        let symbols = Symbols::from(&[0u8, 1][..]);
        assert_eq!(encode(&TEST_PARAMS, &symbols), vec![10, 20, 20, 10]);
        assert_eq!(pulse_ticks(275, 1), 6);
        assert_eq!(pulse_ticks(275, 5), 28);
        assert_eq!(pulse_ticks(5000, 5), 255);
    }

    #[test]
    fn test_encode_skips_unknown_shapes() {
        let symbols = Symbols::from(&[0u8, 7][..]);
        assert_eq!(encode(&TEST_PARAMS, &symbols), vec![10, 20]);
    }

    #[test]
    fn test_resolve_timebase_fixed() {
        assert_eq!(resolve_timebase(&TEST_PARAMS, &[1, 2, 3]), Some(500));
    }

    #[test]
    fn test_resolve_timebase_estimate() {
        let params = &super::super::ev1527::PARAMS;
        // 24 symbols of (5, 15) ticks = 20 ticks per symbol at 250µs
        let window = [5u8, 15].repeat(24);
        assert_eq!(resolve_timebase(params, &window), Some(250));

        let fast = [3u8, 9].repeat(24);
        assert_eq!(resolve_timebase(params, &fast), None);

        let slow = [8u8, 24].repeat(24);
        assert_eq!(resolve_timebase(params, &slow), None);
    }
}
