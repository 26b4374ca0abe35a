fn main() {
    if let Err(e) = toolscript::run_cli() {
        eprintln!("Error: {e:?}");
        std::process::exit(1);
    }
}
