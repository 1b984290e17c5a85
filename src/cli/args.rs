use clap::{ArgAction, Parser};

#[derive(Parser, Debug, Clone)]
#[command(
    name = "databrowse",
    version,
    about = "tabbed browser for REST data collections",
    long_about = "databrowse resolves your session against the site's identity endpoint, fetches the collection behind the selected tab and renders it as a table.\n\nExamples:\n  databrowse -u https://app.example.net/\n  databrowse -u https://app.example.net/ --tab Employees -o page.html\n  databrowse -u https://app.example.net/ -i --format text\n\nTip: Use --config to keep the base URL and category layout out of the command line."
)]
pub struct CliArgs {
    #[arg(
        short = 'v',
        long = "vb",
        visible_alias = "verbose",
        action = ArgAction::Count,
        help_heading = "Output",
        help = "Increase log verbosity (-v, -vv)."
    )]
    pub verbose: u8,

    #[arg(
        long = "nc",
        visible_alias = "no-color",
        help_heading = "Output",
        help = "Disable colored output."
    )]
    pub no_color: bool,

    #[arg(
        short = 'o',
        long = "out",
        visible_alias = "output",
        value_name = "FILE",
        help_heading = "Output",
        help = "Write the rendered page to FILE (rewritten on every change)."
    )]
    pub output: Option<String>,

    #[arg(
        short = 'f',
        long = "fmt",
        visible_alias = "format",
        value_name = "FORMAT",
        help_heading = "Output",
        help = "Output format: html, text or json (inferred from --output when omitted)."
    )]
    pub output_format: Option<String>,

    #[arg(
        short = 'u',
        long = "bu",
        visible_alias = "base-url",
        value_name = "URL",
        help_heading = "Input",
        help = "Site hosting the data API and identity endpoints."
    )]
    pub base_url: Option<String>,

    #[arg(
        short = 'C',
        long = "cfg",
        visible_alias = "config",
        value_name = "FILE",
        help_heading = "Input",
        help = "Path to config file (defaults to ~/.databrowse/config.yml)."
    )]
    pub config: Option<String>,

    #[arg(
        long = "ic",
        visible_alias = "init-config",
        help_heading = "Input",
        help = "Write a commented default config file and exit."
    )]
    pub init_config: bool,

    #[arg(
        short = 't',
        long = "tab",
        visible_alias = "category",
        value_name = "LABEL",
        help_heading = "Browse",
        help = "Select this tab (label or 1-based position) after the page mounts."
    )]
    pub tab: Option<String>,

    #[arg(
        short = 'i',
        long = "int",
        visible_alias = "interactive",
        help_heading = "Browse",
        help = "Read tab selections and commands from stdin."
    )]
    pub interactive: bool,

    #[arg(
        long = "idp",
        visible_alias = "identity-path",
        value_name = "PATH",
        help_heading = "Identity",
        help = "Identity endpoint path (default /.auth/me)."
    )]
    pub identity_path: Option<String>,

    #[arg(
        long = "lip",
        visible_alias = "login-path",
        value_name = "PATH",
        help_heading = "Identity",
        help = "Login navigation target (default /.auth/login/aad)."
    )]
    pub login_path: Option<String>,

    #[arg(
        long = "lop",
        visible_alias = "logout-path",
        value_name = "PATH",
        help_heading = "Identity",
        help = "Logout navigation target (default /.auth/logout)."
    )]
    pub logout_path: Option<String>,

    #[arg(
        long = "to",
        visible_alias = "timeout",
        value_name = "SECS",
        help_heading = "HTTP",
        help = "Request timeout in seconds."
    )]
    pub timeout: Option<u64>,

    #[arg(
        long = "px",
        visible_alias = "proxy",
        value_name = "URL",
        help_heading = "HTTP",
        help = "HTTP proxy URL."
    )]
    pub proxy: Option<String>,

    #[arg(
        long = "hdr",
        visible_alias = "header",
        value_name = "HEADER",
        help_heading = "HTTP",
        help = "Extra request header in 'Key: Value' form."
    )]
    pub header: Option<String>,
}
