use svcwire_frame::{Message, Value};
use svcwire_session::Signature;
use tracing::debug;

use crate::cmd::{open_session, parse_duration, CallArgs};
use crate::exit::{call_error, session_error, CliError, CliResult, DATA_INVALID, FAILURE, SUCCESS, USAGE};
use crate::output::{print_reply, OutputFormat};

pub fn run(args: CallArgs, format: OutputFormat) -> CliResult<i32> {
    let timeout = parse_duration(&args.directory.timeout)?;
    let signature = Signature::parse(&args.signature)
        .map_err(|err| CliError::new(DATA_INVALID, err.to_string()))?;
    let message = build_message(&signature, &args.args)?;

    let session = open_session(&args.directory.directory, timeout)?;
    let object = session
        .try_service(&args.service)
        .map_err(|err| session_error("lookup failed", err))?
        .ok_or_else(|| {
            CliError::new(
                FAILURE,
                format!("service '{}' is not registered", args.service),
            )
        })?;
    debug!(service = %args.service, endpoint = %object.endpoint(), "resolved");

    let future = object
        .call_signature(&signature, &message)
        .map_err(|err| session_error("call failed", err))?;
    future
        .wait(Some(timeout))
        .map_err(|err| call_error("no reply", err))?;
    let reply = future
        .value()
        .map_err(|err| call_error("call failed", err))?;

    print_reply(&args.service, &signature.to_string(), &reply, format);
    Ok(SUCCESS)
}

/// Convert each argument with the type code at the same position.
fn build_message(signature: &Signature, args: &[String]) -> CliResult<Message> {
    if args.len() != signature.args().len() {
        return Err(CliError::new(
            USAGE,
            format!(
                "{signature} takes {} argument(s), got {}",
                signature.args().len(),
                args.len()
            ),
        ));
    }
    signature
        .args()
        .iter()
        .zip(args)
        .map(|(tag, text)| Value::parse_as(*tag, text))
        .collect::<Result<Message, _>>()
        .map_err(|err| CliError::new(DATA_INVALID, err.to_string()))
}
