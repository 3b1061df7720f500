// Copyright 2025-Present GoSight Maintainers
// SPDX-License-Identifier: Apache-2.0

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Use the vendored protoc so builds never depend on a system install.
    std::env::set_var("PROTOC", protoc_bin_vendored::protoc_bin_path()?);

    tonic_build::configure()
        .build_client(true)
        .build_server(true)
        .compile_protos(&["proto/gosight.proto"], &["proto"])?;

    println!("cargo:rerun-if-changed=proto/gosight.proto");
    Ok(())
}
