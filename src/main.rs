fn main() {
    #[cfg(feature = "cli")]
    unravel::cli::run();

    #[cfg(not(feature = "cli"))]
    {
        eprintln!("unravel: CLI not enabled. Rebuild with `--features cli`.");
        std::process::exit(1);
    }
}
