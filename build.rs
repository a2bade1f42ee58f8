fn main() {
    // toml-cfg reads cfg.toml while expanding the config macro
    println!("cargo:rerun-if-changed=cfg.toml");

    #[cfg(feature = "esp")]
    embuild::espidf::sysenv_output();
}
