/// Plugin bundling, handed off to nih_plug_xtask. Usage:
///
///   cargo xtask bundle quanta-delay --release
///
/// Builds the cdylib and writes `Quanta Delay.clap` and `Quanta Delay.vst3`
/// to `target/bundled/`. The AUv2 component is wrapped from the CLAP build.
fn main() -> nih_plug_xtask::Result<()> {
    nih_plug_xtask::main()
}
