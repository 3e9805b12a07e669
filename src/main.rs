//! fb2 - FictionBook 2.0 inspector and converter

use std::error::Error;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use fictionbook::fb2::{read_fb2_bytes, root_namespaces};
use fictionbook::{decode, read_fb2, write_fb2};

type CliResult = Result<(), Box<dyn Error>>;

#[derive(Parser)]
#[command(name = "fb2")]
#[command(version, about = "FictionBook 2.0 inspector and converter", long_about = None)]
#[command(after_help = "EXAMPLES:
    fb2 info book.fb2                   Show book metadata
    fb2 check book.fb2.zip              Validate namespace declarations
    fb2 convert in.fb2 out.fb2 --pretty Re-encode with indentation
    fb2 dump book.fb2 > book.json       Dump the document model as JSON")]
struct Cli {
    /// Fail on malformed XML instead of recovering
    #[arg(short, long, global = true)]
    strict: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show book metadata
    Info {
        /// Input file (.fb2 or .fb2.zip)
        #[arg(value_name = "INPUT")]
        input: String,
    },
    /// Check the root namespace declarations as written in the file
    Check {
        #[arg(value_name = "INPUT")]
        input: String,
    },
    /// Decode and re-encode a document
    Convert {
        #[arg(value_name = "INPUT")]
        input: String,
        #[arg(value_name = "OUTPUT")]
        output: String,
        /// Indent the output
        #[arg(short, long)]
        pretty: bool,
    },
    /// Print the decoded document as JSON
    Dump {
        #[arg(value_name = "INPUT")]
        input: String,
    },
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    let result = match &cli.command {
        Command::Info { input } => show_info(input, cli.strict),
        Command::Check { input } => check(input, cli.strict),
        Command::Convert {
            input,
            output,
            pretty,
        } => convert(input, output, cli.strict, *pretty),
        Command::Dump { input } => dump(input, cli.strict),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn show_info(path: &str, strict: bool) -> CliResult {
    let book = read_fb2(path, strict)?;
    let info = &book.description.title_info;

    println!("File: {path}");
    println!("Title: {}", info.book_title);
    if !info.authors.is_empty() {
        let authors: Vec<String> = info.authors.iter().map(|a| a.display_name()).collect();
        println!("Authors: {}", authors.join(", "));
    }
    if !info.genres.is_empty() {
        println!("Genres: {}", info.genres.join(", "));
    }
    if !info.lang.is_empty() {
        println!("Language: {}", info.lang);
    }
    if let Some(sequence) = &info.sequence {
        match sequence.number {
            Some(n) => println!("Series: {} #{n}", sequence.name),
            None => println!("Series: {}", sequence.name),
        }
    }
    if let Some(image) = &info.coverpage.image {
        let status = if book.cover_binary().is_some() {
            "embedded"
        } else {
            "missing"
        };
        println!("Cover: {} ({status})", image.href);
    }
    println!("Bodies: {}", book.bodies.len());
    println!("Sections: {}", book.sections().count());
    println!("Binaries: {}", book.binaries.len());
    for title in book.body_section_titles() {
        println!("  {title}");
    }

    Ok(())
}

fn check(path: &str, strict: bool) -> CliResult {
    let data = read_fb2_bytes(path)?;
    // Decoding heals namespaces, so validate the declarations as written
    decode(&data, strict)?;
    root_namespaces(&data, strict)?.validate()?;
    println!("{path}: OK");
    Ok(())
}

fn convert(input: &str, output: &str, strict: bool, pretty: bool) -> CliResult {
    let book = read_fb2(input, strict)?;
    write_fb2(&book, output, pretty)?;
    log::info!("converted {input} -> {output}");
    Ok(())
}

fn dump(path: &str, strict: bool) -> CliResult {
    let book = read_fb2(path, strict)?;
    let json = serde_json::to_string_pretty(&book)?;
    println!("{json}");
    Ok(())
}
