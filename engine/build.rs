fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("cargo:rerun-if-changed=proto/dashboard.proto");
    tonic_build::configure()
        .build_server(true)
        .build_client(false)
        .compile(&["proto/dashboard.proto"], &["proto"])?;
    Ok(())
}
