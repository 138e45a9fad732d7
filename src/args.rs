use clap::Parser;

/// Command line arguments for the docchat binary.
#[derive(Parser, Clone, Debug)]
pub struct Args {
    /// Address to bind.
    #[arg(long, default_value = "0.0.0.0")]
    pub host: String,
    /// Port to listen on.
    #[arg(long, default_value_t = 5000)]
    pub port: u16,
}
