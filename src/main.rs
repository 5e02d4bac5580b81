mod ast;
mod dispatch;
mod host;
mod interpreter;
mod lexer;
mod parser;

fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();

    if args.is_empty() {
        eprintln!("evl: expected at least 1 parameter, instead got 0");
        eprintln!("Usage: evl <code> [<line2> [<line3> ...]]");
        std::process::exit(1);
    }

    let mut host = host::Host::with_stderr_echo();

    if let Err(e) = dispatch::run(&args, &mut host) {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}
