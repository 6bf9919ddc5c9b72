// src/process/pipe.rs

//! Plain pipe process: stdout and stderr share one pipe, stdin is piped.

use std::io::{self, Read};
use std::process::Stdio;

use tracing::debug;

use crate::process::decode::Utf8Decoder;
use crate::process::{OutputSource, ProcessSpec, ReadOutcome, Spawned, READ_CHUNK_SIZE};

pub(crate) fn spawn(spec: &ProcessSpec) -> io::Result<Spawned> {
    let (reader, writer) = io::pipe()?;

    #[cfg(unix)]
    {
        use std::os::fd::AsFd;
        crate::process::os::set_nonblocking(reader.as_fd())?;
    }

    let mut command = spec.command();
    command
        .stdin(Stdio::piped())
        .stdout(Stdio::from(writer.try_clone()?))
        .stderr(Stdio::from(writer));

    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        command.process_group(0);
    }

    let mut child = command.spawn()?;
    // The command still holds the pipe's write ends; without dropping it the
    // reader would never see end-of-file.
    drop(command);

    let stdin = child
        .stdin
        .take()
        .ok_or_else(|| io::Error::other("child stdin was not captured"))?;

    debug!(pid = child.id(), "spawned pipe process");

    Ok(Spawned {
        child,
        source: Box::new(PipeSource {
            reader,
            decoder: Utf8Decoder::new(),
            eof: false,
        }),
        input: Box::new(stdin),
    })
}

struct PipeSource {
    reader: io::PipeReader,
    decoder: Utf8Decoder,
    eof: bool,
}

impl OutputSource for PipeSource {
    fn read_available(&mut self) -> io::Result<ReadOutcome> {
        if self.eof {
            return Ok(ReadOutcome::Eof);
        }

        let mut buf = [0u8; READ_CHUNK_SIZE];
        match self.reader.read(&mut buf) {
            Ok(0) => {
                self.eof = true;
                let rest = self.decoder.finish();
                if rest.is_empty() {
                    Ok(ReadOutcome::Eof)
                } else {
                    Ok(ReadOutcome::Data(rest))
                }
            }
            Ok(n) => Ok(ReadOutcome::Data(self.decoder.decode(&buf[..n]))),
            Err(err)
                if matches!(
                    err.kind(),
                    io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
                ) =>
            {
                Ok(ReadOutcome::Pending)
            }
            Err(err) => Err(err),
        }
    }

    fn finish(&mut self) -> String {
        self.decoder.finish()
    }
}
