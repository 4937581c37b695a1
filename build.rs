fn main() {
    built::write_built_file().expect("failed to gather build-time information");
}
