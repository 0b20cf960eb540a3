//! Evolutionary Collage CLI - Evolve a collage towards a target image.

use std::fs;
use std::path::PathBuf;

use log::info;

use evolutionary_collage::{
    compute::{ImageComparator, PartsCatalog, Renderer, evolution::{Evolver, GeneRng}},
    schema::{CollageConfig, RunReport},
};

/// Number of generated parts in the catalog.
const CATALOG_PARTS: usize = 12;
/// Edge length of each generated part, in pixels.
const PART_SIZE: usize = 32;

struct Args {
    config_path: PathBuf,
    report_path: Option<PathBuf>,
    max_generations: Option<usize>,
}

fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        print_usage(&args[0]);
        std::process::exit(1);
    }

    if args[1] == "--example" {
        print_example_config();
        return;
    }

    let args = parse_args(&args).unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        eprintln!();
        print_usage(&args[0]);
        std::process::exit(1);
    });

    // Load configuration
    let config_str = fs::read_to_string(&args.config_path).unwrap_or_else(|e| {
        eprintln!("Error reading config file: {}", e);
        std::process::exit(1);
    });

    let config: CollageConfig = serde_json::from_str(&config_str).unwrap_or_else(|e| {
        eprintln!("Error parsing config: {}", e);
        std::process::exit(1);
    });

    if let Err(e) = config.validate() {
        eprintln!("Invalid config: {}", e);
        std::process::exit(1);
    }

    let catalog = PartsCatalog::procedural(CATALOG_PARTS, PART_SIZE);
    let renderer = Renderer::new(config.render.clone(), catalog).unwrap_or_else(|e| {
        eprintln!("Error creating renderer: {}", e);
        std::process::exit(1);
    });
    let genome_size = renderer.genome_size();

    // Synthetic target: a random collage from a fixed seed
    let target_genes = GeneRng::new(config.target.seed).random_genes(genome_size);
    let target = renderer.render(&target_genes);

    let comparator =
        ImageComparator::new(config.comparator.clone(), &[target]).unwrap_or_else(|e| {
            eprintln!("Error creating comparator: {}", e);
            std::process::exit(1);
        });

    println!("Evolutionary Collage");
    println!("====================");
    println!(
        "Canvas: {}x{} ({} parts, {:?} layout)",
        config.render.width,
        config.render.height,
        config.render.number_of_parts,
        config.render.layout
    );
    println!("Genome size: {}", genome_size);
    println!(
        "Population: {}",
        config.evolution.population_size_for(genome_size)
    );
    println!(
        "Comparator: strictness {}, modes {:?}, {} reference(s) sampled at {}x{}",
        config.comparator.strictness,
        config.comparator.modes,
        comparator.reference_count(),
        comparator.sample_dims().0,
        comparator.sample_dims().1
    );
    println!(
        "Stop after {} stagnant generations",
        config.evolution.max_stagnant_generations
    );
    println!();

    let mut evolver = Evolver::new(config.evolution.clone())
        .with_phenotype_function(renderer.into_phenotype_function())
        .with_fitness_function(comparator.into_fitness_function());

    if let Err(e) = evolver.initialize(genome_size) {
        eprintln!("Error initializing evolver: {}", e);
        std::process::exit(1);
    }

    println!("Running search...");
    let report_every = config.evolution.update_interval.max(1);
    while !evolver.finished() {
        if args
            .max_generations
            .is_some_and(|max| evolver.generation_number() >= max)
        {
            info!("Generation cap reached. Stopping search.");
            break;
        }
        if let Err(e) = evolver.evolve() {
            eprintln!("Error in generation {}: {}", evolver.generation_number() + 1, e);
            std::process::exit(1);
        }

        let progress = evolver.progress();
        if progress.generation % report_every == 0 || progress.fitness_changed {
            println!(
                "  Generation {:04}: fitness={}, stagnant={}/{}, mean={:.4}",
                progress.generation,
                progress.high_score.unwrap_or(0.0),
                progress.stagnant_count,
                progress.max_stagnant_generations,
                progress.mean_fitness.unwrap_or(0.0)
            );
        }
    }

    let stats = evolver.stats();

    println!();
    println!("Final state:");
    println!("  Generations: {}", stats.generations);
    println!("  Evaluations: {}", stats.total_evaluations);
    println!("  Best fitness: {}", stats.best_fitness.unwrap_or(0.0));
    println!(
        "  Time: {:.2}s ({:.1} generations/s)",
        stats.elapsed_seconds,
        stats.generations as f64 / stats.elapsed_seconds.max(f64::EPSILON)
    );

    if let Some(path) = args.report_path {
        let report = RunReport { config, stats };
        if let Err(e) = report.save(&path) {
            eprintln!("Error writing report: {}", e);
            std::process::exit(1);
        }
        println!("Report written to {}", path.display());
    }
}

fn parse_args(args: &[String]) -> Result<Args, String> {
    let mut config_path = None;
    let mut report_path = None;
    let mut max_generations = None;

    let mut rest = args.iter().skip(1);
    while let Some(arg) = rest.next() {
        match arg.as_str() {
            "--report" => {
                let path = rest.next().ok_or("--report needs a path")?;
                report_path = Some(PathBuf::from(path));
            }
            "--max-generations" => {
                let value = rest.next().ok_or("--max-generations needs a number")?;
                let n = value
                    .parse()
                    .map_err(|_| format!("invalid generation count: {}", value))?;
                max_generations = Some(n);
            }
            flag if flag.starts_with("--") => return Err(format!("unknown option: {}", flag)),
            path if config_path.is_none() => config_path = Some(PathBuf::from(path)),
            extra => return Err(format!("unexpected argument: {}", extra)),
        }
    }

    Ok(Args {
        config_path: config_path.ok_or("missing config path")?,
        report_path,
        max_generations,
    })
}

fn print_usage(program: &str) {
    eprintln!(
        "Usage: {} <config.json> [--report <path>] [--max-generations N]",
        program
    );
    eprintln!();
    eprintln!("Evolve a collage towards a synthetic target image.");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  config.json          Path to collage configuration file");
    eprintln!("  --report <path>      Write the settings and run statistics as JSON");
    eprintln!("  --max-generations N  Stop after N generations even if still improving");
    eprintln!();
    eprintln!("Example configuration is generated with --example flag.");
}

fn print_example_config() {
    let config = CollageConfig::default();

    match serde_json::to_string_pretty(&config) {
        Ok(json) => {
            println!("Example configuration (config.json):");
            println!("{}", json);
        }
        Err(e) => {
            eprintln!("Error serializing example config: {}", e);
            std::process::exit(1);
        }
    }
}
