//! Inbound commands to the application service.
//!
//! These represent actions requested by the outside world (serial console,
//! test harness) that the [`AppService`](super::service::AppService)
//! interprets and acts upon.  The console speaks a one-line text form
//! parsed by [`FromStr`].

use core::fmt;
use core::str::FromStr;

use crate::calibration::ProcedureId;
use crate::config::RobotConfig;

/// Commands that external adapters can send into the application core.
#[derive(Debug, Clone, PartialEq)]
pub enum AppCommand {
    /// Run one calibration procedure to completion.
    Run(ProcedureId),

    /// Time the distance transform against its budget.
    ProfileDistances,

    /// Report raw rangefinder frames for this many ticks.
    StreamSensors { ticks: u32 },

    /// Hot-reload configuration.  Rejected unless it validates.
    UpdateConfig(RobotConfig),

    /// Explicitly persist the current config to NVS immediately.
    SaveConfig,

    SetMicrometersPerCount(f32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseCommandError {
    Empty,
    UnknownCommand,
    UnknownProcedure,
    MissingArgument(&'static str),
    InvalidNumber(&'static str),
    TrailingInput,
}

impl fmt::Display for ParseCommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "empty command"),
            Self::UnknownCommand => write!(f, "unknown command"),
            Self::UnknownProcedure => {
                write!(f, "unknown procedure (linear|angular|turn|mpc N|front)")
            }
            Self::MissingArgument(what) => write!(f, "missing argument: {what}"),
            Self::InvalidNumber(what) => write!(f, "invalid number for {what}"),
            Self::TrailingInput => write!(f, "unexpected trailing input"),
        }
    }
}

impl std::error::Error for ParseCommandError {}

fn number<'a, T: FromStr>(
    words: &mut impl Iterator<Item = &'a str>,
    what: &'static str,
) -> Result<T, ParseCommandError> {
    words
        .next()
        .ok_or(ParseCommandError::MissingArgument(what))?
        .parse()
        .map_err(|_| ParseCommandError::InvalidNumber(what))
}

fn procedure<'a>(
    words: &mut impl Iterator<Item = &'a str>,
) -> Result<ProcedureId, ParseCommandError> {
    match words.next() {
        Some("linear") => Ok(ProcedureId::LinearSpeedProfile),
        Some("angular") => Ok(ProcedureId::AngularSpeedProfile),
        Some("turn") => Ok(ProcedureId::StaticTurnRight),
        Some("mpc") => Ok(ProcedureId::MicrometersPerCount {
            cells: number(words, "cells")?,
        }),
        Some("front") => Ok(ProcedureId::FrontSensors),
        Some(_) => Err(ParseCommandError::UnknownProcedure),
        None => Err(ParseCommandError::MissingArgument("procedure")),
    }
}

impl FromStr for AppCommand {
    type Err = ParseCommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let command = match words.next().ok_or(ParseCommandError::Empty)? {
            "run" => Self::Run(procedure(&mut words)?),
            "profile" => Self::ProfileDistances,
            "sensors" => Self::StreamSensors {
                ticks: number(&mut words, "ticks")?,
            },
            "save" => Self::SaveConfig,
            "set" => match words.next() {
                Some("mpc") => {
                    let value: f32 = number(&mut words, "mpc")?;
                    if !value.is_finite() {
                        return Err(ParseCommandError::InvalidNumber("mpc"));
                    }
                    Self::SetMicrometersPerCount(value)
                }
                _ => return Err(ParseCommandError::UnknownCommand),
            },
            _ => return Err(ParseCommandError::UnknownCommand),
        };
        if words.next().is_some() {
            return Err(ParseCommandError::TrailingInput);
        }
        Ok(command)
    }
}
