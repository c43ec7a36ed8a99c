use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Execute a program
    Run(FileArgs),
    /// Print the token stream without executing
    Tokens(FileArgs),
    /// Print the compiled instruction listing and label table
    Dump(FileArgs),
}

#[derive(Debug, Args)]
struct FileArgs {
    file: String,
}

fn main() {
    let args = Cli::parse();

    let result = match &args.command {
        Command::Run(args) => run_command(args),
        Command::Tokens(args) => tokens_command(args),
        Command::Dump(args) => dump_command(args),
    };

    if let Err(e) = result {
        eprintln!("{e}");
        std::process::exit(1);
    }
}

#[derive(Debug, thiserror::Error)]
enum InterpretError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Tokenize(#[from] stackvm::tokenizer::TokenizeError),
    #[error(transparent)]
    Parse(#[from] stackvm::parser::ParseError),
    #[error(transparent)]
    Runtime(#[from] stackvm::vm::RuntimeError),
}

fn run_command(args: &FileArgs) -> Result<(), InterpretError> {
    let program = compile(&args.file)?;
    let mut vm = stackvm::vm::Vm::default();
    vm.run(&program)?;
    Ok(())
}

fn tokens_command(args: &FileArgs) -> Result<(), InterpretError> {
    let source = std::fs::read_to_string(&args.file)?;
    for token in stackvm::tokenizer::tokens(&source)? {
        println!("{}", token);
    }
    Ok(())
}

fn dump_command(args: &FileArgs) -> Result<(), InterpretError> {
    let program = compile(&args.file)?;
    program.disassemble(&args.file);
    Ok(())
}

fn compile(file: &str) -> Result<stackvm::parser::Program, InterpretError> {
    let source = std::fs::read_to_string(file)?;
    let tokens = stackvm::tokenizer::tokens(&source)?;
    Ok(stackvm::parser::program(&tokens)?)
}
