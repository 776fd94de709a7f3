/// The Faultline fuzzing proxy.
///
/// Forwards traffic between fuzzing clients and a target server while
/// tracing the server process, and writes a crash report whenever a fault
/// correlates with recent network input.
#[derive(clap::Parser)]
pub struct CliOpts {
    /// Proxy configuration (KDL format).
    ///
    /// If it ends with `.kdl`, it is treated as a path to a configuration
    /// file. Otherwise it is directly parsed as inline KDL-formatted
    /// configuration. When omitted, defaults apply.
    #[clap(short, long, value_name = "CONTENT/PATH")]
    pub config: Option<String>,

    /// Endpoint to accept clients on, as `tcp:host:port`.
    #[clap(short, long, value_name = "ENDPOINT")]
    pub listen: String,

    /// Endpoint of the target server, as `tcp:host:port`.
    #[clap(short, long, value_name = "ENDPOINT")]
    pub upstream: String,

    /// IDs of already-running processes to attach to.
    #[clap(long, value_name = "PID", num_args = 1.., conflicts_with_all = ["name", "program"])]
    pub pids: Vec<i32>,

    /// Name of a running process to find and attach to.
    #[clap(long, value_name = "NAME", conflicts_with = "program")]
    pub name: Option<String>,

    /// Program to spawn under trace, followed by its arguments.
    #[clap(value_name = "PROGRAM", trailing_var_arg = true, allow_hyphen_values = true)]
    pub program: Vec<String>,
}

impl CliOpts {
    /// Parses the CLI from the command-line.
    ///
    /// # Warning
    ///
    /// Exits on error.
    pub fn parse_from_cmdline() -> Self {
        <Self as clap::Parser>::parse()
    }
}
