//! Decoding and querying of the `mappings` field.
//!
//! Lines are 1-based and columns 0-based inside this module, the usual
//! convention of source map consumers. [`super::SourceMap`] converts to the
//! 0-based lines used everywhere else.

// ============================================================================
// Imports
// ============================================================================

use std::sync::LazyLock;

use base64::alphabet;

use crate::error::{Error, Result};

// ============================================================================
// VLQ
// ============================================================================

/// Reverse lookup for the base64 alphabet used by VLQ digits.
static VLQ_DIGITS: LazyLock<[Option<u8>; 128]> = LazyLock::new(|| {
    let mut table = [None; 128];
    for (value, byte) in alphabet::STANDARD.as_str().bytes().enumerate() {
        table[byte as usize] = Some(value as u8);
    }
    table
});

const VLQ_CONTINUATION: i64 = 0b10_0000;
const VLQ_MASK: i64 = 0b01_1111;
const VLQ_SHIFT_LIMIT: u32 = 60;

/// Decodes one comma-separated segment into its signed fields.
fn decode_segment(segment: &str) -> Result<Vec<i64>> {
    let mut fields = Vec::with_capacity(5);
    let mut value: i64 = 0;
    let mut shift: u32 = 0;

    for byte in segment.bytes() {
        let digit = VLQ_DIGITS
            .get(byte as usize)
            .copied()
            .flatten()
            .ok_or_else(|| Error::source_map(format!("invalid VLQ digit {:?}", byte as char)))?;
        let digit = i64::from(digit);

        value += (digit & VLQ_MASK) << shift;
        if digit & VLQ_CONTINUATION != 0 {
            shift += 5;
            if shift > VLQ_SHIFT_LIMIT {
                return Err(Error::source_map("VLQ value overflows"));
            }
            continue;
        }

        let magnitude = value >> 1;
        fields.push(if value & 1 == 1 { -magnitude } else { magnitude });
        value = 0;
        shift = 0;
    }

    if shift != 0 {
        return Err(Error::source_map(format!("truncated VLQ segment {segment:?}")));
    }
    Ok(fields)
}

// ============================================================================
// Mapping
// ============================================================================

/// Position in an authored source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct OriginalLocation {
    /// Index into the map's `sources`.
    pub source: u32,
    /// 1-based line.
    pub line: u32,
    /// 0-based column.
    pub column: u32,
}

/// Position in the generated file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct GeneratedLocation {
    /// 1-based line.
    pub line: u32,
    /// 0-based column.
    pub column: u32,
}

/// One decoded segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mapping {
    /// Generated position.
    pub generated: GeneratedLocation,
    /// Authored position; `None` for unmapped generated code.
    pub original: Option<OriginalLocation>,
}

/// Decodes a `mappings` string.
///
/// `sources_len` bounds the source indices so that lookups never index out
/// of range later.
///
/// # Errors
///
/// Returns [`Error::SourceMap`] for invalid digits, wrong field counts,
/// negative positions or out-of-range source indices.
pub fn decode(mappings: &str, sources_len: usize) -> Result<Vec<Mapping>> {
    let mut decoded = Vec::new();
    let (mut source, mut original_line, mut original_column) = (0i64, 0i64, 0i64);

    for (line_index, line) in mappings.split(';').enumerate() {
        let generated_line = u32::try_from(line_index + 1)
            .map_err(|_| Error::source_map("too many generated lines"))?;
        let mut generated_column = 0i64;

        for segment in line.split(',').filter(|s| !s.is_empty()) {
            let fields = decode_segment(segment)?;
            // The optional fifth field indexes `names`, which the bridge does not use.
            if !matches!(fields.len(), 1 | 4 | 5) {
                return Err(Error::source_map(format!(
                    "segment {segment:?} has {} fields",
                    fields.len()
                )));
            }

            generated_column += fields[0];
            let original = if fields.len() >= 4 {
                source += fields[1];
                original_line += fields[2];
                original_column += fields[3];

                if source < 0 || source as usize >= sources_len {
                    return Err(Error::source_map(format!("source index {source} out of range")));
                }
                Some(OriginalLocation {
                    source: source as u32,
                    line: to_u32(original_line + 1)?,
                    column: to_u32(original_column)?,
                })
            } else {
                None
            };

            decoded.push(Mapping {
                generated: GeneratedLocation {
                    line: generated_line,
                    column: to_u32(generated_column)?,
                },
                original,
            });
        }
    }

    Ok(decoded)
}

fn to_u32(value: i64) -> Result<u32> {
    u32::try_from(value).map_err(|_| Error::source_map(format!("position {value} out of range")))
}

// ============================================================================
// MappingTable
// ============================================================================

/// Entry of the authored-order index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct ByOriginal {
    original: OriginalLocation,
    generated: GeneratedLocation,
}

/// Bidirectional position index over decoded mappings.
///
/// Both lookups use a greatest-lower-bound bias restricted to the requested
/// line: the nearest mapping at or before the requested column wins. When
/// the column precedes every mapping on the line, the line's first mapping
/// is used. A lookup never moves to another line.
#[derive(Debug, Clone, Default)]
pub struct MappingTable {
    by_generated: Vec<(GeneratedLocation, OriginalLocation)>,
    by_original: Vec<ByOriginal>,
}

impl MappingTable {
    /// Builds both indices.
    #[must_use]
    pub fn new(mappings: &[Mapping]) -> Self {
        let mut by_generated: Vec<_> = mappings
            .iter()
            .filter_map(|m| m.original.map(|original| (m.generated, original)))
            .collect();
        by_generated.sort_by_key(|(generated, _)| *generated);

        let mut by_original: Vec<_> = by_generated
            .iter()
            .map(|&(generated, original)| ByOriginal {
                original,
                generated,
            })
            .collect();
        by_original.sort_unstable();

        Self {
            by_generated,
            by_original,
        }
    }

    /// Number of mapped segments.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_generated.len()
    }

    /// Returns `true` if nothing is mapped.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_generated.is_empty()
    }

    /// Maps a generated position (1-based line) to its authored position.
    #[must_use]
    pub fn original_position_for(&self, line: u32, column: u32) -> Option<OriginalLocation> {
        let start = self.by_generated.partition_point(|(g, _)| g.line < line);
        let end = self.by_generated.partition_point(|(g, _)| g.line <= line);
        let on_line = &self.by_generated[start..end];

        let idx = on_line.partition_point(|(g, _)| g.column <= column);
        let (_, original) = if idx == 0 {
            on_line.first()?
        } else {
            &on_line[idx - 1]
        };
        Some(*original)
    }

    /// Maps an authored position (1-based line) in `source` to the earliest
    /// generated position for it.
    #[must_use]
    pub fn generated_position_for(
        &self,
        source: u32,
        line: u32,
        column: u32,
    ) -> Option<GeneratedLocation> {
        let key = |e: &ByOriginal| (e.original.source, e.original.line);
        let start = self.by_original.partition_point(|e| key(e) < (source, line));
        let end = self.by_original.partition_point(|e| key(e) <= (source, line));
        let on_line = &self.by_original[start..end];

        let idx = on_line.partition_point(|e| e.original.column <= column);
        let chosen = if idx == 0 {
            on_line.first()?.original.column
        } else {
            on_line[idx - 1].original.column
        };

        // Several generated positions may share one authored column; take the first.
        let first = on_line.partition_point(|e| e.original.column < chosen);
        Some(on_line[first].generated)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_segment_values() {
        assert_eq!(decode_segment("A").expect("valid"), vec![0]);
        assert_eq!(decode_segment("C").expect("valid"), vec![1]);
        assert_eq!(decode_segment("D").expect("valid"), vec![-1]);
        assert_eq!(decode_segment("gB").expect("valid"), vec![16]);
        assert_eq!(decode_segment("AAgBC").expect("valid"), vec![0, 0, 16, 1]);
    }

    #[test]
    fn test_decode_segment_errors() {
        assert!(decode_segment("g").is_err());
        assert!(decode_segment("A!").is_err());
    }

    #[test]
    fn test_decode_relative_fields() {
        // line 1: col 0 -> src 0 (1,0); col 4 -> src 0 (1,4)
        // line 2: col 2 -> src 0 (2,2)
        let mappings = decode("AAAA,IAAI;EACF", 1).expect("valid");
        assert_eq!(mappings.len(), 3);
        assert_eq!(mappings[1].generated, GeneratedLocation { line: 1, column: 4 });
        assert_eq!(
            mappings[2].original,
            Some(OriginalLocation {
                source: 0,
                line: 2,
                column: 2
            })
        );
    }

    #[test]
    fn test_decode_rejects_bad_source_index() {
        assert!(decode("ACAA", 1).is_err());
        assert!(decode("AA", 1).is_err());
    }

    #[test]
    fn test_unmapped_segments_are_skipped_by_table() {
        let mappings = decode("A,EAAA", 1).expect("valid");
        assert_eq!(mappings.len(), 2);
        assert!(mappings[0].original.is_none());

        let table = MappingTable::new(&mappings);
        assert_eq!(table.len(), 1);
    }

    fn sample_table() -> MappingTable {
        // generated line 1: col 0 -> (1,0), col 10 -> (1,8)
        // generated line 3: col 4 -> (2,4)
        let mappings = decode("AAAA,UAAQ;;IACJ", 1).expect("valid");
        MappingTable::new(&mappings)
    }

    #[test]
    fn test_original_position_greatest_lower_bound() {
        let table = sample_table();
        let at = table.original_position_for(1, 12).expect("mapped");
        assert_eq!((at.line, at.column), (1, 8));

        let at = table.original_position_for(1, 9).expect("mapped");
        assert_eq!((at.line, at.column), (1, 0));
    }

    #[test]
    fn test_original_position_stays_on_line() {
        let table = sample_table();
        assert!(table.original_position_for(2, 0).is_none());

        // Before the first mapping on line 3: use that line's first mapping.
        let at = table.original_position_for(3, 0).expect("mapped");
        assert_eq!((at.line, at.column), (2, 4));
    }

    #[test]
    fn test_generated_position_for() {
        let table = sample_table();
        let at = table.generated_position_for(0, 1, 9).expect("mapped");
        assert_eq!(at, GeneratedLocation { line: 1, column: 10 });

        let at = table.generated_position_for(0, 2, 0).expect("mapped");
        assert_eq!(at, GeneratedLocation { line: 3, column: 4 });

        assert!(table.generated_position_for(0, 5, 0).is_none());
        assert!(table.generated_position_for(1, 1, 0).is_none());
    }
}
