use crate::cmd::{open_session, parse_duration, ResolveArgs};
use crate::exit::{session_error, CliError, CliResult, FAILURE, SUCCESS};
use crate::output::{print_service, OutputFormat};

pub fn run(args: ResolveArgs, format: OutputFormat) -> CliResult<i32> {
    let timeout = parse_duration(&args.directory.timeout)?;
    let session = open_session(&args.directory.directory, timeout)?;

    let info = session
        .service_info(&args.service)
        .map_err(|err| session_error("lookup failed", err))?
        .ok_or_else(|| {
            CliError::new(
                FAILURE,
                format!("service '{}' is not registered", args.service),
            )
        })?;

    print_service(&info, format);
    Ok(SUCCESS)
}
