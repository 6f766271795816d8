//! Command-line interface for ebnf2cfg
//! This binary converts EBNF grammar files into plain context-free grammars.
//!
//! Usage:
//!   ebnf2cfg convert `<input>` [`<output>`] [--readable] [--strict] [--verbose]  - Convert a grammar file
//!   ebnf2cfg check `<input>` [--strict] [--format `<format>`]                  - Parse and report
//!   ebnf2cfg tokens `<input>` [--format `<format>`]                            - Dump the token stream

use clap::{Arg, ArgAction, Command};

use ebnf2cfg::ebnf::converter::{Converter, NamingMode};
use ebnf2cfg::ebnf::lexer;
use ebnf2cfg::ebnf::parser::{self, ParserConfig};

fn main() {
    let matches = Command::new("ebnf2cfg")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Converts EBNF grammars into plain context-free grammars")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("convert")
                .about("Convert a grammar file, writing the CFG next to it")
                .arg(
                    Arg::new("input")
                        .help("Path to the EBNF grammar file")
                        .required(true)
                        .index(1),
                )
                .arg(
                    Arg::new("output")
                        .help("Output path (defaults to <input>.out)")
                        .index(2),
                )
                .arg(
                    Arg::new("readable")
                        .long("readable")
                        .help("Name fresh symbols with short random letters instead of composed ones")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("strict")
                        .long("strict")
                        .help("Require the two-space bind marker before every statement")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("verbose")
                        .long("verbose")
                        .short('v')
                        .help("Print lexical warnings to stderr")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("check")
                .about("Parse a grammar file and report errors and warnings")
                .arg(
                    Arg::new("input")
                        .help("Path to the EBNF grammar file")
                        .required(true)
                        .index(1),
                )
                .arg(
                    Arg::new("strict")
                        .long("strict")
                        .help("Require the two-space bind marker before every statement")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("format")
                        .long("format")
                        .short('f')
                        .help("Report format ('text' or 'json')")
                        .default_value("text"),
                ),
        )
        .subcommand(
            Command::new("tokens")
                .about("Dump the token stream of a grammar file")
                .arg(
                    Arg::new("input")
                        .help("Path to the EBNF grammar file")
                        .required(true)
                        .index(1),
                )
                .arg(
                    Arg::new("format")
                        .long("format")
                        .short('f')
                        .help("Dump format ('plain' or 'json')")
                        .default_value("plain"),
                ),
        )
        .get_matches();

    // Handle subcommands
    match matches.subcommand() {
        Some(("convert", convert_matches)) => {
            let input = convert_matches.get_one::<String>("input").unwrap();
            let output = convert_matches.get_one::<String>("output");
            handle_convert_command(
                input,
                output.map(String::as_str),
                convert_matches.get_flag("readable"),
                convert_matches.get_flag("strict"),
                convert_matches.get_flag("verbose"),
            );
        }
        Some(("check", check_matches)) => {
            let input = check_matches.get_one::<String>("input").unwrap();
            let format = check_matches.get_one::<String>("format").unwrap();
            handle_check_command(input, check_matches.get_flag("strict"), format);
        }
        Some(("tokens", tokens_matches)) => {
            let input = tokens_matches.get_one::<String>("input").unwrap();
            let format = tokens_matches.get_one::<String>("format").unwrap();
            handle_tokens_command(input, format);
        }
        _ => unreachable!(),
    }
}

/// Handle the convert command
fn handle_convert_command(
    input: &str,
    output: Option<&str>,
    readable: bool,
    strict: bool,
    verbose: bool,
) {
    let source = read_source(input);
    let output_path = match output {
        Some(path) => path.to_owned(),
        None => format!("{}.out", input),
    };

    let config = ParserConfig {
        strict_bind_markers: strict,
    };
    let parsed = match parser::parse_with_config(&source, config) {
        Ok(parsed) => parsed,
        Err(e) => {
            // Failures land in the output file so a build that consumes
            // it sees the diagnostics instead of a stale grammar.
            write_output(&output_path, &format!("{}\n", e));
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };
    if verbose {
        for warning in &parsed.warnings {
            eprintln!("Warning: {}", warning);
        }
    }

    let naming = if readable {
        NamingMode::Readable
    } else {
        NamingMode::Symbolic
    };
    let converted = match Converter::new(&parsed.grammar, naming).run() {
        Ok(converted) => converted,
        Err(e) => {
            write_output(&output_path, &format!("{}\n", e));
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };
    for warning in &converted.warnings {
        eprintln!("Warning: {}", warning);
    }

    write_output(&output_path, &converted.grammar.to_string());
}

/// Handle the check command
fn handle_check_command(input: &str, strict: bool, format: &str) {
    let source = read_source(input);
    let config = ParserConfig {
        strict_bind_markers: strict,
    };
    let parsed = match parser::parse_with_config(&source, config) {
        Ok(parsed) => parsed,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    match format {
        "json" => {
            let json = serde_json::to_string_pretty(&parsed.grammar).unwrap_or_else(|e| {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            });
            println!("{}", json);
        }
        "text" => {
            println!(
                "OK: start symbol {}, {} name bindings, {} rules",
                parsed.grammar.start,
                parsed.grammar.name_bindings.len(),
                parsed.grammar.rules.len()
            );
        }
        other => {
            eprintln!("Error: unknown format '{}'", other);
            std::process::exit(1);
        }
    }
    for warning in &parsed.warnings {
        eprintln!("Warning: {}", warning);
    }
}

/// Handle the tokens command
fn handle_tokens_command(input: &str, format: &str) {
    let source = read_source(input);
    let (tokens, warnings) = lexer::tokenize_with_spans(&source);

    match format {
        "json" => {
            let stream: Vec<_> = tokens.into_iter().map(|(token, _)| token).collect();
            let json = serde_json::to_string_pretty(&stream).unwrap_or_else(|e| {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            });
            println!("{}", json);
        }
        "plain" => {
            for (token, span) in &tokens {
                println!(
                    "{}..{} {}({})",
                    span.start,
                    span.end,
                    token.kind(),
                    token.text()
                );
            }
        }
        other => {
            eprintln!("Error: unknown format '{}'", other);
            std::process::exit(1);
        }
    }
    for warning in &warnings {
        eprintln!("Warning: {}", warning);
    }
}

fn read_source(path: &str) -> String {
    std::fs::read_to_string(path).unwrap_or_else(|e| {
        eprintln!("Error reading file: {}", e);
        std::process::exit(1);
    })
}

fn write_output(path: &str, contents: &str) {
    std::fs::write(path, contents).unwrap_or_else(|e| {
        eprintln!("Error writing {}: {}", path, e);
        std::process::exit(1);
    });
}
