fn main() {
    if let Err(e) = databrowse::app::run_cli() {
        eprintln!("{e}");
        std::process::exit(1);
    }
}
