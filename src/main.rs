fn main() {
    #[cfg(feature = "cli")]
    jdelta::cli::run();

    #[cfg(not(feature = "cli"))]
    {
        eprintln!("jdelta: CLI not enabled. Rebuild with `--features cli`.");
        std::process::exit(1);
    }
}
