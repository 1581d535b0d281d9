fn main() {
    bobbin::cli::run();
}
