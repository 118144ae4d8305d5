fn main() {
    if let Err(err) = focuslog_lib::run() {
        eprintln!("focuslog: {err:#}");
        std::process::exit(1);
    }
}
