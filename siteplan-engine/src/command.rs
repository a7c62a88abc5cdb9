use std::collections::HashMap;

use siteplan_core::site::{GeoPoint, Road, Side};
use tracing::debug;

use crate::session::Session;

#[derive(Debug, Clone)]
pub struct CommandRequest {
    pub name: String,
    pub args: Vec<String>,
}

impl CommandRequest {
    pub fn new<I, S>(name: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CommandResponse {
    pub success: bool,
    pub message: Option<String>,
}

impl CommandResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
        }
    }
}

pub trait CommandHandler: Send + Sync {
    fn name(&self) -> &'static str;
    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse;
}

pub struct CommandContext<'a> {
    pub session: &'a mut Session,
}

/// 会话动作的统一入口：地图点选、清除位置、调整道路。
pub struct CommandBus {
    handlers: HashMap<&'static str, Box<dyn CommandHandler>>,
}

impl CommandBus {
    pub fn new() -> Self {
        let mut bus = Self {
            handlers: HashMap::new(),
        };
        bus.register(PickLocationCommand);
        bus.register(ClearLocationCommand);
        bus.register(SetRoadCommand);
        bus.register(RemoveRoadCommand);
        bus
    }

    pub fn register<H: CommandHandler + 'static>(&mut self, handler: H) {
        self.handlers.insert(handler.name(), Box::new(handler));
    }

    pub fn dispatch(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        if let Some(handler) = self.handlers.get(request.name.as_str()) {
            let response = handler.execute(request, context);
            debug!(
                command = %request.name,
                success = response.success,
                "命令已执行"
            );
            response
        } else {
            CommandResponse::err(format!("未知命令: {}", request.name))
        }
    }

    pub fn available_commands(&self) -> impl Iterator<Item = &&'static str> {
        self.handlers.keys()
    }
}

impl Default for CommandBus {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_number(value: Option<&String>, what: &str) -> Result<f64, CommandResponse> {
    let raw = value.ok_or_else(|| CommandResponse::err(format!("缺少参数: {what}")))?;
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|number| number.is_finite())
        .ok_or_else(|| CommandResponse::err(format!("{what} 不是有效数字: {raw}")))
}

fn parse_side(value: Option<&String>) -> Result<Side, CommandResponse> {
    let raw = value.ok_or_else(|| CommandResponse::err("缺少参数: side"))?;
    raw.parse::<Side>()
        .map_err(|err| CommandResponse::err(err.to_string()))
}

/// `pick_location LAT LON`
struct PickLocationCommand;

impl CommandHandler for PickLocationCommand {
    fn name(&self) -> &'static str {
        "pick_location"
    }

    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        let parsed = parse_number(request.args.first(), "lat")
            .and_then(|lat| parse_number(request.args.get(1), "lon").map(|lon| (lat, lon)));
        match parsed {
            Ok((lat, lon)) => {
                let point = GeoPoint::new(lat, lon);
                context.session.pick_location(point);
                CommandResponse::ok(format!("位置已设置: {point}"))
            }
            Err(response) => response,
        }
    }
}

struct ClearLocationCommand;

impl CommandHandler for ClearLocationCommand {
    fn name(&self) -> &'static str {
        "clear_location"
    }

    fn execute(
        &self,
        _request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        context.session.clear_location();
        CommandResponse::ok("位置已清除")
    }
}

/// `set_road SIDE WIDTH`
struct SetRoadCommand;

impl CommandHandler for SetRoadCommand {
    fn name(&self) -> &'static str {
        "set_road"
    }

    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        let parsed = parse_side(request.args.first())
            .and_then(|side| parse_number(request.args.get(1), "width").map(|width| (side, width)));
        match parsed {
            Ok((_, width)) if width < 0.0 => {
                CommandResponse::err(format!("道路宽度不能为负: {width}"))
            }
            Ok((side, width)) => {
                context.session.set_road(side, Road::new(true, width));
                CommandResponse::ok(format!("{side} 道路宽度 {width:.1} m"))
            }
            Err(response) => response,
        }
    }
}

/// `remove_road SIDE`，保留原宽度。
struct RemoveRoadCommand;

impl CommandHandler for RemoveRoadCommand {
    fn name(&self) -> &'static str {
        "remove_road"
    }

    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        match parse_side(request.args.first()) {
            Ok(side) => {
                let current = context.session.form().roads.get(side);
                context
                    .session
                    .set_road(side, Road::new(false, current.width_m));
                CommandResponse::ok(format!("{side} 道路已移除"))
            }
            Err(response) => response,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use siteplan_core::site::SheetForm;

    #[test]
    fn pick_and_clear_location_commands() {
        let mut session = Session::new(SheetForm::default());
        let bus = CommandBus::new();
        let mut context = CommandContext {
            session: &mut session,
        };

        let first = bus.dispatch(
            &CommandRequest::new("pick_location", ["12.9716", "77.5946"]),
            &mut context,
        );
        assert!(first.success);
        let second = bus.dispatch(
            &CommandRequest::new("pick_location", ["13.0", "77.6"]),
            &mut context,
        );
        assert!(second.success);
        assert_eq!(context.session.location(), Some(GeoPoint::new(13.0, 77.6)));

        let clear = bus.dispatch(
            &CommandRequest::new("clear_location", Vec::<String>::new()),
            &mut context,
        );
        assert!(clear.success);
        assert!(context.session.location().is_none());
    }

    #[test]
    fn malformed_arguments_are_rejected() {
        let mut session = Session::new(SheetForm::default());
        let bus = CommandBus::new();
        let mut context = CommandContext {
            session: &mut session,
        };

        let missing = bus.dispatch(&CommandRequest::new("pick_location", ["12.0"]), &mut context);
        assert!(!missing.success);
        let garbage = bus.dispatch(
            &CommandRequest::new("pick_location", ["north", "77.0"]),
            &mut context,
        );
        assert!(!garbage.success);
        assert!(context.session.location().is_none());

        let negative = bus.dispatch(&CommandRequest::new("set_road", ["east", "-2"]), &mut context);
        assert!(!negative.success);
        let unknown = bus.dispatch(&CommandRequest::new("rotate", ["90"]), &mut context);
        assert!(!unknown.success);
    }

    #[test]
    fn road_commands_update_form() {
        let mut session = Session::new(SheetForm::default());
        let bus = CommandBus::new();
        let mut context = CommandContext {
            session: &mut session,
        };

        let set = bus.dispatch(&CommandRequest::new("set_road", ["east", "7.5"]), &mut context);
        assert!(set.success);
        assert_eq!(context.session.form().roads.east, Road::new(true, 7.5));

        let removed = bus.dispatch(&CommandRequest::new("remove_road", ["E"]), &mut context);
        assert!(removed.success);
        assert_eq!(context.session.form().roads.east, Road::new(false, 7.5));
        assert_eq!(bus.available_commands().count(), 4);
    }
}
