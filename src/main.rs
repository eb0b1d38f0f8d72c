fn main() {
    if let Err(err) = csv_autojoin::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
