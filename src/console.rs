//! Line-oriented operator console.
//!
//! Commands follow the dome controller convention of an optional value
//! followed by a two letter code, e.g. `"120.5 MV"` or `"HM"`.

use regex::{Regex, RegexSet};

use crate::{
    dome::ScopeDome,
    error::ScopeDomeResult,
    shutter::ShutterOperation,
    status::{CommandOutcome, Relay},
};

const MOVE_AZ_REGEX: &str = r"^(?P<az>-?[0-9]+(?:\.[0-9]*)?) MV$";
const MOVE_REL_REGEX: &str = r"^(?P<delta>-?[0-9]+(?:\.[0-9]*)?) MR$";
const HOME_AZIMUTH_REGEX: &str = r"^HM$";
const DEROTATE_REGEX: &str = r"^DR$";
const PARK_REGEX: &str = r"^PK$";
const UNPARK_REGEX: &str = r"^UP$";
const OPEN_SHUTTER_REGEX: &str = r"^SO$";
const CLOSE_SHUTTER_REGEX: &str = r"^SC$";
const STOP_MOTION_REGEX: &str = r"^ST$";
const RELAY_REGEX: &str = r"^(?P<relay>[A-Za-z0-9]+) (?P<state>ON|OFF) RL$";
const HOME_OFFSET_REGEX: &str = r"^(?P<az>-?[0-9]+(?:\.[0-9]*)?) HO$";
const PARK_SHUTTER_REGEX: &str = r"^(?P<state>ON|OFF) PS$";
const PARK_HERE_REGEX: &str = r"^PC$";
const PARK_DEFAULT_REGEX: &str = r"^PD$";
const GET_STATUS_REGEX: &str = r"^\+$";

#[derive(Debug, Clone, PartialEq)]
pub enum OperatorCommand {
    MoveAz(f64),
    MoveRel(f64),
    HomeAzimuth,
    Derotate,
    Park,
    Unpark,
    OpenShutter,
    CloseShutter,
    StopMotion,
    SetRelay(Relay, bool),
    SetHomeOffset(f64),
    SetParkShutter(bool),
    SetParkToCurrent,
    SetDefaultPark,
    GetStatus,
    Unknown,
}

pub struct OperatorConsole {
    regex_set: RegexSet,
    regex: Vec<Regex>,
}

impl OperatorConsole {
    pub fn new() -> ScopeDomeResult<OperatorConsole> {
        let regex_set = RegexSet::new([
            MOVE_AZ_REGEX,
            MOVE_REL_REGEX,
            HOME_AZIMUTH_REGEX,
            DEROTATE_REGEX,
            PARK_REGEX,
            UNPARK_REGEX,
            OPEN_SHUTTER_REGEX,
            CLOSE_SHUTTER_REGEX,
            STOP_MOTION_REGEX,
            RELAY_REGEX,
            HOME_OFFSET_REGEX,
            PARK_SHUTTER_REGEX,
            PARK_HERE_REGEX,
            PARK_DEFAULT_REGEX,
            GET_STATUS_REGEX,
        ])?;

        let regex = regex_set
            .patterns()
            .iter()
            .map(|pattern| Regex::new(pattern))
            .collect::<Result<Vec<Regex>, _>>()?;

        Ok(OperatorConsole { regex_set, regex })
    }

    fn get_match_index(&self, text: &str) -> Option<usize> {
        self.regex_set.matches(text).into_iter().next()
    }

    fn capture_f64(&self, index: usize, text: &str, name: &str) -> Option<f64> {
        let capture = self.regex[index].captures(text)?;
        capture[name].parse().ok()
    }

    fn capture_on(&self, index: usize, text: &str) -> Option<bool> {
        let capture = self.regex[index].captures(text)?;
        Some(&capture["state"] == "ON")
    }

    pub fn parse(&self, text: &str) -> OperatorCommand {
        let text = text.trim();
        let Some(match_index) = self.get_match_index(text) else {
            return OperatorCommand::Unknown;
        };

        let command = match match_index {
            0 => self
                .capture_f64(match_index, text, "az")
                .map(OperatorCommand::MoveAz),
            1 => self
                .capture_f64(match_index, text, "delta")
                .map(OperatorCommand::MoveRel),
            2 => Some(OperatorCommand::HomeAzimuth),
            3 => Some(OperatorCommand::Derotate),
            4 => Some(OperatorCommand::Park),
            5 => Some(OperatorCommand::Unpark),
            6 => Some(OperatorCommand::OpenShutter),
            7 => Some(OperatorCommand::CloseShutter),
            8 => Some(OperatorCommand::StopMotion),
            9 => self.regex[match_index].captures(text).and_then(|capture| {
                let relay = Relay::from_name(&capture["relay"])?;
                Some(OperatorCommand::SetRelay(relay, &capture["state"] == "ON"))
            }),
            10 => self
                .capture_f64(match_index, text, "az")
                .map(OperatorCommand::SetHomeOffset),
            11 => self
                .capture_on(match_index, text)
                .map(OperatorCommand::SetParkShutter),
            12 => Some(OperatorCommand::SetParkToCurrent),
            13 => Some(OperatorCommand::SetDefaultPark),
            14 => Some(OperatorCommand::GetStatus),
            _ => None,
        };
        command.unwrap_or(OperatorCommand::Unknown)
    }
}

fn describe(outcome: CommandOutcome) -> String {
    match outcome {
        CommandOutcome::Complete => "OK".to_string(),
        CommandOutcome::InProgress => "BUSY".to_string(),
        CommandOutcome::Ignored => "IGNORED".to_string(),
    }
}

/// Run one operator command against the session and return the reply line.
pub async fn apply(dome: &mut ScopeDome, command: OperatorCommand) -> ScopeDomeResult<String> {
    let outcome = match command {
        OperatorCommand::MoveAz(az) => dome.move_abs(az).await?,
        OperatorCommand::MoveRel(delta) => dome.move_rel(delta).await?,
        OperatorCommand::HomeAzimuth => dome.find_home().await?,
        OperatorCommand::Derotate => dome.derotate().await?,
        OperatorCommand::Park => dome.park().await?,
        OperatorCommand::Unpark => dome.unpark().await?,
        OperatorCommand::OpenShutter => dome.control_shutter(ShutterOperation::Open).await?,
        OperatorCommand::CloseShutter => dome.control_shutter(ShutterOperation::Close).await?,
        OperatorCommand::StopMotion => dome.abort().await?,
        OperatorCommand::SetRelay(relay, on) => dome.set_relay(relay, on).await?,
        OperatorCommand::SetHomeOffset(az) => {
            dome.set_home_offset(az);
            CommandOutcome::Complete
        }
        OperatorCommand::SetParkShutter(enabled) => {
            dome.set_park_shutter(enabled);
            CommandOutcome::Complete
        }
        OperatorCommand::SetParkToCurrent => {
            dome.set_park_to_current();
            CommandOutcome::Complete
        }
        OperatorCommand::SetDefaultPark => {
            dome.set_default_park();
            CommandOutcome::Complete
        }
        OperatorCommand::GetStatus => return Ok(dome.status().to_string()),
        OperatorCommand::Unknown => return Ok("Unknown command.".to_string()),
    };
    Ok(describe(outcome))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        card::DomeCard, config::DomeConfig, inertia::InertiaTable, simulator::SimulatedCard,
        status::DomeMotion,
    };

    #[test]
    fn test_parse_move_az() {
        let console = OperatorConsole::new().unwrap();

        assert_eq!(console.parse("101 MV"), OperatorCommand::MoveAz(101.0));
        assert_eq!(console.parse("  12.5 MV\r\n"), OperatorCommand::MoveAz(12.5));
    }

    #[test]
    fn test_parse_move_rel() {
        let console = OperatorConsole::new().unwrap();

        assert_eq!(console.parse("-30 MR"), OperatorCommand::MoveRel(-30.0));
    }

    #[test]
    fn test_parse_get_status() {
        let console = OperatorConsole::new().unwrap();

        assert_eq!(console.parse("+"), OperatorCommand::GetStatus);
    }

    #[test]
    fn test_parse_codes() {
        let console = OperatorConsole::new().unwrap();

        assert_eq!(console.parse("HM"), OperatorCommand::HomeAzimuth);
        assert_eq!(console.parse("DR"), OperatorCommand::Derotate);
        assert_eq!(console.parse("PK"), OperatorCommand::Park);
        assert_eq!(console.parse("UP"), OperatorCommand::Unpark);
        assert_eq!(console.parse("SO"), OperatorCommand::OpenShutter);
        assert_eq!(console.parse("SC"), OperatorCommand::CloseShutter);
        assert_eq!(console.parse("ST"), OperatorCommand::StopMotion);
        assert_eq!(console.parse("PC"), OperatorCommand::SetParkToCurrent);
        assert_eq!(console.parse("PD"), OperatorCommand::SetDefaultPark);
    }

    #[test]
    fn test_parse_relay() {
        let console = OperatorConsole::new().unwrap();

        assert_eq!(
            console.parse("fan ON RL"),
            OperatorCommand::SetRelay(Relay::Fan, true)
        );
        assert_eq!(
            console.parse("3 OFF RL"),
            OperatorCommand::SetRelay(Relay::Relay3, false)
        );
        assert_eq!(console.parse("heater ON RL"), OperatorCommand::Unknown);
    }

    #[test]
    fn test_parse_settings() {
        let console = OperatorConsole::new().unwrap();

        assert_eq!(console.parse("12 HO"), OperatorCommand::SetHomeOffset(12.0));
        assert_eq!(console.parse("OFF PS"), OperatorCommand::SetParkShutter(false));
    }

    #[test]
    fn test_parse_unknown() {
        let console = OperatorConsole::new().unwrap();

        assert_eq!(console.parse("XX"), OperatorCommand::Unknown);
        assert_eq!(console.parse("MV"), OperatorCommand::Unknown);
        assert_eq!(console.parse("HMX"), OperatorCommand::Unknown);
    }

    #[tokio::test]
    async fn test_apply_drives_session() {
        let mut dome = ScopeDome::connect(
            DomeCard::Simulator(SimulatedCard::default()),
            DomeConfig::default(),
            InertiaTable::default(),
        )
        .await
        .unwrap();

        let reply = apply(&mut dome, OperatorCommand::MoveAz(45.0)).await.unwrap();
        assert_eq!(reply, "BUSY");
        assert_eq!(dome.motion(), DomeMotion::MovingToTarget);

        let reply = apply(&mut dome, OperatorCommand::StopMotion).await.unwrap();
        assert_eq!(reply, "OK");

        let reply = apply(&mut dome, OperatorCommand::GetStatus).await.unwrap();
        assert!(reply.starts_with("AZ "));
    }
}
