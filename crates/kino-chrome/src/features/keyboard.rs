//! Focus tracking and key routing

use crate::command::PlayerCommand;
use crate::dom::{DomEvent, DomEventKind, EventTarget, ListenerId};
use crate::Result;

use super::{Feature, FeatureContext};

#[derive(Debug, Default)]
pub struct KeyboardFeature {
    container_keydown: Option<ListenerId>,
    global_keydown: Option<ListenerId>,
    global_click: Option<ListenerId>,
}

impl KeyboardFeature {
    fn inside_container(ctx: &FeatureContext<'_>, event: &DomEvent) -> bool {
        event
            .target_node()
            .is_some_and(|target| ctx.doc.contains(ctx.nodes.container, target))
    }
}

impl Feature for KeyboardFeature {
    fn build(&mut self, ctx: &mut FeatureContext<'_>) -> Result<()> {
        let container = EventTarget::Node(ctx.nodes.container);
        self.container_keydown = Some(ctx.listen(container, DomEventKind::KeyDown));
        self.global_keydown = Some(ctx.listen(EventTarget::Document, DomEventKind::KeyDown));
        self.global_click = Some(ctx.listen(EventTarget::Document, DomEventKind::Click));
        Ok(())
    }

    fn clean(&mut self, ctx: &mut FeatureContext<'_>) -> Result<()> {
        for id in [self.container_keydown.take(), self.global_keydown.take(), self.global_click.take()]
            .into_iter()
            .flatten()
        {
            ctx.unlisten(id);
        }
        Ok(())
    }

    fn on_dom_event(&mut self, ctx: &mut FeatureContext<'_>, listener: ListenerId, event: &DomEvent) {
        let listener = Some(listener);
        if listener == self.container_keydown {
            ctx.request(PlayerCommand::SetKeyboardAction(true));
        } else if listener == self.global_keydown {
            let inside = Self::inside_container(ctx, event);
            ctx.request(PlayerCommand::SetFocus(inside));
            ctx.request(PlayerCommand::KeyDown(event.clone()));
        } else if listener == self.global_click {
            let inside = Self::inside_container(ctx, event);
            ctx.request(PlayerCommand::SetFocus(inside));
        }
    }
}
