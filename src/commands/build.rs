use std::path::Path;

use crate::{build::Builder, config::Config, config::base_path_from_config};

pub async fn run(config: Config, config_path: &Path) -> Result<(), anyhow::Error> {
    // Relative paths in the config are relative to the config file
    let base_path = base_path_from_config(config_path);

    let builder = Builder::new(config, base_path);
    let result = builder.build().await?;

    println!(
        "Built {} file(s) to {} in {}ms",
        result.files,
        result.output_dir.display(),
        result.elapsed.as_millis()
    );
    if result.collisions > 0 {
        println!(
            "{} file(s) were replaced by a later file with the same output path",
            result.collisions
        );
    }

    Ok(())
}
