//! This example dumps construction events of a text USDA file.
//!
//! Every prim is printed as its block closes, children before parents.
//!
//! # Usage:
//! ```bash
//! cargo run --example dump_usda ./fixtures/scene.usda
//! ```

use std::{env, fs};

use anyhow::{Context as _, Result};
use openusd_text::usda::{self, Builder, Parser, PrimSpec, Property, StageMetas};

#[derive(Default)]
struct Dump {
    next_index: i64,
}

impl Builder for Dump {
    fn assign_prim_index(&mut self, _parent: i64) -> i64 {
        let index = self.next_index;
        self.next_index += 1;
        index
    }

    fn accept_stage_metas(&mut self, metas: &StageMetas) -> Result<()> {
        println!("-- Stage metadata");
        println!("Default prim: {}", metas.default_prim);
        println!("Up axis: {:?}", metas.up_axis);
        println!("Sub layers: {:?}", metas.sub_layers);
        for (name, (qual, var)) in &metas.unregistered {
            println!("\t{} {} = {:?} ({})", qual, name, var.value, var.type_name);
        }
        println!();

        Ok(())
    }

    fn has_prim_type(&self, _ty: &str) -> bool {
        true
    }

    fn construct_prim(&mut self, ty: &str, spec: &PrimSpec) -> Result<()> {
        println!(
            "#{}:\t{} {} {} (parent: {})",
            spec.index, spec.specifier, ty, spec.path, spec.parent
        );

        for (name, (qual, var)) in &spec.metas {
            println!("\t\t{} {} = {:?}", qual, name, var.value);
        }

        for (name, property) in &spec.properties {
            match property {
                Property::Attribute(attr) => {
                    println!("\t\t{} {} -> {:?}", attr.type_name, name, attr.value);
                    if let Some(samples) = &attr.time_samples {
                        println!("\t\t\t{} time samples", samples.len());
                    }
                }
                Property::Relation(rel) => println!("\t\trel {} -> {:?}", name, rel.targets),
            }
        }

        for (set, variants) in &spec.variant_sets {
            println!("\t\tvariantSet {}: {:?}", set, variants.keys().collect::<Vec<_>>());
        }

        Ok(())
    }
}

fn main() -> Result<()> {
    let args = env::args().collect::<Vec<_>>();

    let path = args
        .get(1)
        .context("Missing path to usda file, use: cargo run --example dump_usda {PATH_TO_FILE}.usda")?;

    let data = fs::read_to_string(path).context("Failed to read text file")?;
    if !usda::is_usda(data.as_bytes(), 64) {
        anyhow::bail!("{} is not a USDA file", path);
    }

    let mut parser = Parser::new(&data);
    let result = parser.parse(&mut Dump::default());

    print!("{}", parser.warning());
    print!("{}", parser.error());

    result
}
