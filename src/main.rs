fn main() {
    if let Err(e) = ambient_hub::run() {
        eprintln!("ambient-hub: {}", e);
        std::process::exit(1);
    }
}
