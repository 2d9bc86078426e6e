//! Time samples: `{ time: value, ... }`.

use anyhow::{Context, Result};

use crate::sdf::{TimeSamples, TypeName, Value, ValueType};

use super::parser::Parser;

impl<'a> Parser<'a> {
    /// Samples of a scalar typed attribute, `None` marks a blocked sample.
    ///
    /// Samples are kept in file order, duplicates included.
    pub fn parse_time_samples(&mut self, ty: ValueType) -> Result<TimeSamples> {
        self.parse_samples_with(|p| p.parse_value(ty))
    }

    /// Samples of an array typed attribute (`float3[] points.timeSamples`).
    pub fn parse_time_samples_of_array(&mut self, ty: ValueType) -> Result<TimeSamples> {
        self.parse_samples_with(|p| p.parse_typed_value(TypeName::array(ty)))
    }

    fn parse_samples_with(&mut self, mut read: impl FnMut(&mut Self) -> Result<Value>) -> Result<TimeSamples> {
        self.ensure_pun('{').context("Time samples must start with {")?;

        if self.eat_pun('}')? {
            return Ok(TimeSamples::default());
        }

        let samples = self.sep_by1(',', '}', |p| {
            let time = p.parse_scalar::<f64>().context("Unable to parse sample time")?;
            p.ensure_pun(':')?;

            let value = p
                .parse_optional(&mut read)
                .with_context(|| format!("Unable to parse sample value at time {}", time))?;

            Ok((time, value))
        })?;

        self.ensure_pun('}').context("Time samples must be closed with }")?;

        Ok(TimeSamples { samples })
    }
}
