use std::env;

use hfa_reader::HfaReader;

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: {} <path-to-img-file>", args[0]);
        std::process::exit(1);
    }

    let path = &args[1];
    println!("Reading HFA raster: {}", path);
    println!("{}", "=".repeat(60));

    let mut reader = match HfaReader::open(path) {
        Ok(reader) => reader,
        Err(e) => {
            eprintln!("\nERROR: Failed to open raster");
            eprintln!("  {}", e);
            std::process::exit(1);
        }
    };

    match reader.read() {
        Ok(model) => {
            println!("\n{}", "=".repeat(60));
            println!("SUCCESS! Decoding completed.");
            println!("{}", "=".repeat(60));

            println!("\nRaster Information:");
            println!("  Grid: {} x {} cells", model.width, model.height);
            println!("  Cell size: {} x {}", model.cell_size.0, model.cell_size.1);
            println!(
                "  Bounding box: [{}, {}, {}, {}]",
                model.bounding_box.min_x,
                model.bounding_box.min_y,
                model.bounding_box.max_x,
                model.bounding_box.max_y
            );
            match reader.coordinate_reference_system() {
                Ok(Some(crs)) => println!("  CRS: {} (EPSG: {:?})", crs.name, crs.epsg),
                Ok(None) => println!("  CRS: none resolved"),
                Err(e) => println!("  CRS: {}", e),
            }
            if let Ok(bands) = reader.num_bands() {
                println!("  Bands: {}", bands);
            }

            println!("\nSample cells (first 10):");
            for (i, cell) in model.cells.iter().take(10).enumerate() {
                println!("  {}. {}", i + 1, cell);
            }
            if model.cells.len() > 10 {
                println!("  ... and {} more", model.cells.len() - 10);
            }
        }
        Err(e) => {
            eprintln!("\nERROR: Failed to decode raster");
            eprintln!("  {}", e);
            std::process::exit(1);
        }
    }
    reader.close();
}
