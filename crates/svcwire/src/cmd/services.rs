use crate::cmd::{open_session, parse_duration, ServicesArgs};
use crate::exit::{session_error, CliResult, SUCCESS};
use crate::output::{print_services, OutputFormat};

pub fn run(args: ServicesArgs, format: OutputFormat) -> CliResult<i32> {
    let timeout = parse_duration(&args.directory.timeout)?;
    let session = open_session(&args.directory.directory, timeout)?;

    let services = session
        .services()
        .map_err(|err| session_error("listing failed", err))?;

    print_services(&services, format);
    Ok(SUCCESS)
}
