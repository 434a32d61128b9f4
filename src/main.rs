#![warn(clippy::all)]

//! mapmap-inspect - loads geometry and data files into a map and prints the
//! resulting layers, key coverage and fitted projection.

#[cfg(not(target_arch = "wasm32"))]
fn main() -> std::process::ExitCode {
    use clap::Parser;

    env_logger::init();

    match inspect::run(inspect::Args::parse()) {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            std::process::ExitCode::FAILURE
        }
    }
}

// The library is driven by the page on wasm32; there is nothing to run.
#[cfg(target_arch = "wasm32")]
fn main() {}

#[cfg(not(target_arch = "wasm32"))]
mod inspect {
    use clap::Parser;
    use futures_executor::LocalPool;
    use mapmap_core::{
        ConfigOverrides, DataSource, FsLoader, GeometryOptions, MapConfig, SourceLoader,
        ThematicMap,
    };
    use std::rc::Rc;

    #[derive(Debug, Parser)]
    #[command(name = "mapmap-inspect")]
    #[command(about = "Load map geometry and data and print the result", long_about = None)]
    pub struct Args {
        /// Geometry files (GeoJSON, TopoJSON or .shp), loaded in order
        #[arg(required = true)]
        geometry: Vec<String>,

        /// Data file (JSON records) merged onto the features; repeatable
        #[arg(long)]
        data: Vec<String>,

        /// Property used as the feature key
        #[arg(long = "key")]
        key_field: Option<String>,

        /// Map configuration file (JSON)
        #[arg(long)]
        config: Option<String>,
    }

    pub fn run(args: Args) -> Result<(), String> {
        let mut config = match &args.config {
            Some(path) => {
                let text =
                    std::fs::read_to_string(path).map_err(|e| format!("{}: {}", path, e))?;
                MapConfig::from_json(&text).map_err(|e| format!("{}: {}", path, e))?
            }
            None => MapConfig::default(),
        };
        config.apply(&ConfigOverrides {
            key_field: args.key_field.clone(),
            ..ConfigOverrides::default()
        });
        let key_field = config.key_field.clone();

        let mut pool = LocalPool::new();
        let map = ThematicMap::new(Rc::new(pool.spawner()), config);
        let loader = FsLoader::new();

        let geometry: Vec<_> = args
            .geometry
            .iter()
            .map(|path| {
                let ticket = map.load_geometry(loader.load_geometry(path), GeometryOptions::new());
                (path, ticket)
            })
            .collect();
        let data: Vec<_> = args
            .data
            .iter()
            .map(|path| {
                let load = loader.load_records(path, &key_field);
                (path, map.load_data(DataSource::Records(load)))
            })
            .collect();

        let mut failures = 0;
        for (path, ticket) in geometry {
            match pool.run_until(ticket) {
                Ok(names) => println!("{}: {}", path, names.join(", ")),
                Err(e) => {
                    println!("{}: failed: {}", path, e);
                    failures += 1;
                }
            }
        }
        for (path, ticket) in data {
            match pool.run_until(ticket) {
                Ok(merged) => println!("{}: merged onto {} features", path, merged),
                Err(e) => {
                    println!("{}: failed: {}", path, e);
                    failures += 1;
                }
            }
        }
        pool.run_until(map.data_ready());

        println!();
        println!("{:<24} {:>9} {:>9}", "layer", "features", "keyed");
        map.with_store(|store| {
            for layer in store.iter() {
                let keyed = layer
                    .features()
                    .iter()
                    .filter(|f| f.borrow().canonical_key().is_some())
                    .count();
                println!("{:<24} {:>9} {:>9}", layer.name(), layer.len(), keyed);
            }
        });

        let projection = map.projection();
        println!();
        println!(
            "projection ({:?}): scale {:.3}, center ({:.4}, {:.4}), translate ({:.1}, {:.1})",
            map.extent_state(),
            projection.scale,
            projection.center.x,
            projection.center.y,
            projection.translate.x,
            projection.translate.y
        );
        let canvas = map.config().canvas;
        let (min_lon, min_lat, max_lon, max_lat) =
            projection.visible_bounds(canvas.width, canvas.height);
        println!(
            "visible ({}x{}): lon {:.4}..{:.4}, lat {:.4}..{:.4}",
            canvas.width, canvas.height, min_lon, max_lon, min_lat, max_lat
        );

        if failures > 0 {
            let total = args.geometry.len() + args.data.len();
            return Err(format!("{} of {} loads failed", failures, total));
        }
        Ok(())
    }

}
