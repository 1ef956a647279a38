//! Entry point of the echo plugin binary.

use cadence_plugin_echo::EchoPlugin;

fn main() {
    cadence_rpc::serve(EchoPlugin::new())
}
