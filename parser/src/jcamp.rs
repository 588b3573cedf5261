//! Parsing of the ParaVision JCAMP-DX parameter dialect.
//!
//! A parameter listing is a sequence of records:
//!
//! ```text
//! ##TITLE=Parameter List, ParaVision 6.0.1
//! $$ comment lines start with a double dollar sign
//! ##$VisuCoreDim=2
//! ##$VisuCoreSize=( 2 )
//! 128 128
//! ##$VisuCoreWordType=_16BIT_SGN_INT
//! ##END=
//! ```
//!
//! Parameter records (`##$NAME`) are converted to typed values,
//! while core labels (`##TITLE`, `##OWNER`, ...) are kept verbatim.
use crate::error::{
    ArrayLengthSnafu, DuplicateFieldSnafu, FormatError, InvalidNumberSnafu, MissingSeparatorSnafu,
};
use crate::set::ParameterSet;
use crate::value::{NumericArray, ParameterValue, Shape};
use snafu::{ensure, OptionExt};

/// Prefix of a record line.
const RECORD_PREFIX: &str = "##";
/// Prefix of a comment line.
const COMMENT_PREFIX: &str = "$$";
/// Prefix of a parameter tag, after the record prefix.
const PARAMETER_PREFIX: char = '$';
/// The tag closing a listing.
const END_TAG: &str = "END";

type Result<T, E = FormatError> = std::result::Result<T, E>;

/// Parse a full parameter listing into a parameter set.
pub fn parse_listing(text: &str) -> Result<ParameterSet> {
    let mut set = ParameterSet::new();
    let mut current: Option<(String, String)> = None;

    for (i, line) in text.lines().enumerate() {
        let line = line.trim_end();
        if line.starts_with(COMMENT_PREFIX) {
            continue;
        }
        if let Some(record) = line.strip_prefix(RECORD_PREFIX) {
            if let Some((tag, raw)) = current.take() {
                push_record(&mut set, &tag, &raw)?;
            }
            let (tag, raw) = record.split_once('=').context(MissingSeparatorSnafu {
                line: i + 1,
                text: line,
            })?;
            let tag = tag.trim();
            if tag == END_TAG {
                break;
            }
            current = Some((tag.to_string(), raw.to_string()));
        } else if let Some((_, raw)) = current.as_mut() {
            // continuation of the current record
            raw.push(' ');
            raw.push_str(line);
        }
    }
    if let Some((tag, raw)) = current.take() {
        push_record(&mut set, &tag, &raw)?;
    }

    Ok(set)
}

fn push_record(set: &mut ParameterSet, tag: &str, raw: &str) -> Result<()> {
    let (name, value) = match tag.strip_prefix(PARAMETER_PREFIX) {
        Some(name) => (name, parse_value(name, raw)?),
        None => (tag, ParameterValue::Opaque(normalize(raw))),
    };
    ensure!(!set.contains(name), DuplicateFieldSnafu { field: name });
    set.insert(name, value);
    Ok(())
}

/// Interpret the raw text of a parameter value.
///
/// The same rules apply to values read from a parameter file
/// and to values read back from a human readable dump,
/// since the dump renders values in a single-line form of the dialect.
pub fn parse_value(field: &str, raw: &str) -> Result<ParameterValue> {
    let raw = raw.trim();

    if raw.starts_with('(') {
        return match split_array_header(raw) {
            Some((shape, body)) => parse_array(field, raw, shape, body),
            None => Ok(ParameterValue::Opaque(normalize(raw))),
        };
    }

    if let Some(text) = raw.strip_prefix('<').and_then(|s| s.strip_suffix('>')) {
        return Ok(ParameterValue::Text(text.to_string()));
    }

    if let Some(number) = parse_number(raw) {
        return Ok(ParameterValue::Scalar(number));
    }

    Ok(ParameterValue::Text(normalize(raw)))
}

/// Separate the `( d1, d2, ... )` header of an array value from its body.
///
/// Returns `None` when the parenthesized part is not a list of sizes,
/// or when an unpadded header such as `(3)` has no body
/// (inline structures look like that).
/// A padded header such as `( 3 )` always declares an array,
/// even when its body is missing.
fn split_array_header(raw: &str) -> Option<(Shape, &str)> {
    let close = raw.find(')')?;
    let shape = raw[1..close]
        .split(',')
        .map(|d| d.trim().parse::<usize>().ok())
        .collect::<Option<Shape>>()?;
    let body = raw[close + 1..].trim();
    if body.is_empty() && !raw.starts_with("( ") {
        return None;
    }
    Some((shape, body))
}

/// The number of elements of an array shape,
/// saturating when it does not fit in memory.
fn element_count(shape: &[usize]) -> usize {
    shape
        .iter()
        .try_fold(1usize, |count, &d| count.checked_mul(d))
        .unwrap_or(usize::MAX)
}

fn parse_array(field: &str, raw: &str, shape: Shape, body: &str) -> Result<ParameterValue> {
    let declared = element_count(&shape);

    if body.starts_with('<') {
        // strings: the last dimension is the character buffer length
        let strings = split_strings(body);
        let expected = element_count(&shape[..shape.len() - 1]);
        ensure!(
            strings.len() == expected,
            ArrayLengthSnafu {
                field,
                declared: expected,
                found: strings.len(),
            }
        );
        return Ok(if strings.len() == 1 {
            ParameterValue::Text(strings[0].to_string())
        } else {
            ParameterValue::Opaque(normalize(raw))
        });
    }

    if body.starts_with('(') {
        return Ok(ParameterValue::Opaque(normalize(raw)));
    }

    let tokens = expand_tokens(body);
    let numeric = tokens.first().map_or(true, |t| parse_number(t).is_some());
    ensure!(
        tokens.len() == declared,
        ArrayLengthSnafu {
            field,
            declared,
            found: tokens.len(),
        }
    );

    if !numeric {
        // enumeration words
        return Ok(if tokens.len() == 1 {
            ParameterValue::Text(tokens[0].to_string())
        } else {
            ParameterValue::Opaque(normalize(raw))
        });
    }

    let values = tokens
        .iter()
        .map(|token| parse_number(token).context(InvalidNumberSnafu { field, token: *token }))
        .collect::<Result<Vec<f64>>>()?;
    let found = values.len();
    let array = NumericArray::new(shape, values).context(ArrayLengthSnafu {
        field,
        declared,
        found,
    })?;
    Ok(ParameterValue::Sequence(array))
}

/// Split the whitespace separated tokens of an array body,
/// expanding run-length tokens of the form `@N*(v)`.
fn expand_tokens(body: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    for token in body.split_whitespace() {
        match parse_run_length(token) {
            Some((count, value)) => tokens.extend(std::iter::repeat(value).take(count)),
            None => tokens.push(token),
        }
    }
    tokens
}

fn parse_run_length(token: &str) -> Option<(usize, &str)> {
    let (count, value) = token.strip_prefix('@')?.split_once('*')?;
    let value = value.strip_prefix('(')?.strip_suffix(')')?;
    Some((count.parse().ok()?, value))
}

/// Collect the contents of all `<...>` strings in a body.
fn split_strings(body: &str) -> Vec<&str> {
    let mut strings = Vec::new();
    let mut rest = body;
    while let Some(start) = rest.find('<') {
        match rest[start + 1..].find('>') {
            Some(len) => {
                strings.push(&rest[start + 1..start + 1 + len]);
                rest = &rest[start + 2 + len..];
            }
            None => break,
        }
    }
    strings
}

/// Parse a numeric token.
///
/// Only tokens shaped like numbers are accepted,
/// so that words such as `inf` or `NaN` stay text.
fn parse_number(token: &str) -> Option<f64> {
    let first = token.chars().next()?;
    if !(first.is_ascii_digit() || first == '-' || first == '+' || first == '.') {
        return None;
    }
    token.parse().ok()
}

/// Collapse all whitespace runs into single spaces.
fn normalize(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}
