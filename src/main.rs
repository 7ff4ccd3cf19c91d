fn main() {
    inspection_pipeline::cli::run();
}
