/**
 * AlsReco
 * Copyright (C) 2018 Sebastian Schelter
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with this program. If not, see <http://www.gnu.org/licenses/>.
 */

use std::env;
use std::error::Error;
use std::process;

use getopts::Options;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use alsreco::{io, ModelConfig, Recommender};

fn main() {

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = env::args().collect();
    let program = args[0].clone();

    let mut opts = Options::new();
    opts.optopt("i", "inputfile", "Input file name (required). The input consists of interactions \
        between users and items. The input file must contain a user, item and quantity triple per \
        line, separated by tabs.", "PATH");
    opts.optopt("o", "outputfile", "Output file name (optional, output will be written to stdout \
        by default).", "PATH");
    opts.optopt("n", "num-items", "Number of items to recommend per user (optional, defaults to \
        10).", "NUMBER");
    opts.optopt("c", "config", "JSON file with model hyperparameters (optional). Missing fields \
        keep their defaults.", "PATH");
    opts.optflag("h", "help", "Print this help menu");

    let matches = match opts.parse(&args[1..]) {
        Ok(matches) => matches,
        Err(failure) => {
            let hint = failure.to_string();
            return print_usage_and_exit(&program, opts, Some(&hint))
        },
    };

    if matches.opt_present("h") {
        return print_usage_and_exit(&program, opts, None);
    }

    let interactions_path = match matches.opt_str("i") {
        Some(path) => path,
        None => return print_usage_and_exit(
            &program,
            opts,
            Some("Please specify an inputfile via --inputfile."),
        ),
    };

    let recommendations_path = matches.opt_str("o");

    let n: usize = match matches.opt_get_default("n", 10) {
        Ok(n) => n,
        Err(failure) => {
            let hint = format!("Problem with option 'n': {}", failure.to_string());
            return print_usage_and_exit(&program, opts, Some(&hint))
        },
    };

    let config = match matches.opt_str("c") {
        Some(config_path) => match ModelConfig::from_json_file(&config_path) {
            Ok(config) => config,
            Err(failure) => {
                let hint = format!("Problem with config file {}: {}", config_path, failure);
                return print_usage_and_exit(&program, opts, Some(&hint))
            },
        },
        None => ModelConfig::default(),
    };

    if let Err(failure) = compute_recommendations(&interactions_path, n, &config, recommendations_path) {
        error!("{}", failure);
        process::exit(1);
    }
}

fn print_usage_and_exit(
    program: &str,
    opts: Options,
    hint: Option<&str>
) {

    if let Some(hint) = hint {
        eprintln!("\n{}\n", hint);
    }

    let brief = format!("Usage: {} [options]", program);
    eprint!("{}", opts.usage(&brief));

    process::exit(if hint.is_some() { 2 } else { 0 });
}

fn compute_recommendations(
    interactions_path: &str,
    n: usize,
    config: &ModelConfig,
    recommendations_path: Option<String>,
) -> Result<(), Box<dyn Error>> {

    info!("Reading interactions from {}", interactions_path);
    let interactions = io::read_interactions(interactions_path)?;

    info!(
        "Training {} factors for {} iterations on {} threads",
        config.factors,
        config.iterations,
        config.num_threads(),
    );
    let recommender = Recommender::train(interactions, config)?;

    info!("Writing {} recommendations for each of {} users...", n, recommender.num_users());
    io::write_recommendations(&recommender, n, recommendations_path)?;

    Ok(())
}
