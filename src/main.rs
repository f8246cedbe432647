use colored::Colorize;

fn main() {
    if let Err(e) = teamkit::run() {
        eprintln!("{} {}", "error:".red().bold(), e);
        std::process::exit(e.exit_code());
    }
}
