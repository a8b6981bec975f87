use nom::{
    branch::alt,
    bytes::complete::tag_no_case,
    character::complete::{char, multispace0},
    combinator::{map, opt, value},
    number::complete::double,
    sequence::{preceded, separated_pair, terminated},
    IResult, Parser,
};

use crate::error::{PlanError, Result};
use crate::gas::GasMix;

#[derive(Debug, Clone, PartialEq)]
enum GasSpec {
    Air,
    Oxygen,
    Nitrox(f64),
    Trimix(f64, f64),
}

impl GasSpec {
    fn into_mix(self) -> Result<GasMix> {
        match self {
            GasSpec::Air => Ok(GasMix::air()),
            GasSpec::Oxygen => Ok(GasMix::oxygen()),
            GasSpec::Nitrox(o2) => GasMix::nitrox(o2),
            GasSpec::Trimix(o2, he) => GasMix::trimix(o2, he),
        }
    }
}

/// Parse a gas name such as `air`, `EAN32`, `Nx50`, `32%`, `oxygen`,
/// `21/35` or `Tx18/45`. Percentages are O₂ (and He for trimix).
pub fn parse_gas(input: &str) -> Result<GasMix> {
    let input = input.trim();
    if input.is_empty() {
        return Err(PlanError::GasNameParse {
            position: 0,
            message: "empty gas name".to_string(),
        });
    }

    match gas_spec(input) {
        Ok((remaining, spec)) => {
            let remaining = remaining.trim();
            if remaining.is_empty() {
                spec.into_mix()
            } else {
                Err(PlanError::GasNameParse {
                    position: input.len() - remaining.len(),
                    message: format!("unexpected characters: '{}'", remaining),
                })
            }
        }
        Err(_) => Err(PlanError::GasNameParse {
            position: 0,
            message: format!("unrecognised gas name: '{}'", input),
        }),
    }
}

fn gas_spec(input: &str) -> IResult<&str, GasSpec> {
    alt((parse_trimix, parse_nitrox, parse_oxygen, parse_air, parse_percentage)).parse(input)
}

fn parse_air(input: &str) -> IResult<&str, GasSpec> {
    value(GasSpec::Air, tag_no_case("air")).parse(input)
}

fn parse_oxygen(input: &str) -> IResult<&str, GasSpec> {
    value(
        GasSpec::Oxygen,
        alt((tag_no_case("oxygen"), tag_no_case("o2"))),
    )
    .parse(input)
}

fn parse_nitrox(input: &str) -> IResult<&str, GasSpec> {
    let prefix = alt((
        tag_no_case("nitrox"),
        tag_no_case("eanx"),
        tag_no_case("ean"),
        tag_no_case("nx"),
    ));
    map(preceded((prefix, multispace0), percent), GasSpec::Nitrox).parse(input)
}

fn parse_trimix(input: &str) -> IResult<&str, GasSpec> {
    let prefix = alt((tag_no_case("trimix"), tag_no_case("tx")));
    map(
        preceded(
            opt((prefix, multispace0)),
            separated_pair(double, (multispace0, char('/'), multispace0), double),
        ),
        |(o2, he)| GasSpec::Trimix(o2, he),
    )
    .parse(input)
}

fn parse_percentage(input: &str) -> IResult<&str, GasSpec> {
    map(percent, GasSpec::Nitrox).parse(input)
}

fn percent(input: &str) -> IResult<&str, f64> {
    terminated(double, opt(char('%'))).parse(input)
}
