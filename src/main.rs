fn main() {
    georef_pipeline::cli::run();
}
