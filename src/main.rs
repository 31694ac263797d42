use chestnut_etl::cli::{args::Args, commands};
use clap::Parser;
use std::process;

fn main() {
    let args = Args::parse();

    // If no subcommand was provided, show help and available commands
    if args.command.is_none() {
        show_help_and_commands();
        process::exit(0);
    }

    match commands::run(args) {
        Ok(()) => process::exit(0),
        Err(error) => {
            eprintln!("Error: {:#}", error);
            process::exit(1);
        }
    }
}

/// Show help information and available commands when no subcommand is provided
fn show_help_and_commands() {
    println!("chestnut-etl - fixed-width instrument data loader");
    println!("=================================================");
    println!();
    println!("Select zip archives of .dat files by date window, stack and clean them,");
    println!("and append the result to a SQLite table.");
    println!();
    println!("USAGE:");
    println!("    chestnut-etl [--config FILE] [-v|-q] <COMMAND> [OPTIONS]");
    println!();
    println!("COMMANDS:");
    println!("    discover    List archives inside a date window");
    println!("    ingest      Extract one archive and print the stacked table");
    println!("    load        Discover, ingest and append archives to a database table");
    println!("    secret      Fetch a secret through the credential broker");
    println!("    help        Show this help message or help for specific commands");
    println!();
    println!("EXAMPLES:");
    println!("    # Archives for February 2020 under month directories:");
    println!("    chestnut-etl discover /data/eosac --dates 202002");
    println!();
    println!("    # Load a date range, matching dates in archive names:");
    println!("    chestnut-etl load /data/eosac --dates 20200210-20200315 \\");
    println!("                      --strategy flat --table flux --database flux.db");
    println!();
    println!("For detailed help on any command, use:");
    println!("    chestnut-etl <COMMAND> --help");
}
