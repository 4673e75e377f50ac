//! Loading, error and big-play overlays (video only)

use crate::command::PlayerCommand;
use crate::dom::{DomEvent, DomEventKind, EventTarget, ListenerId, NodeId};
use crate::media::MediaEvent;
use crate::Result;

use super::{Feature, FeatureContext};

#[derive(Debug, Default)]
pub struct OverlaysFeature {
    loading: Option<NodeId>,
    error: Option<NodeId>,
    error_message: Option<NodeId>,
    big_play: Option<NodeId>,
    big_play_button: Option<NodeId>,
    click: Option<ListenerId>,
}

impl OverlaysFeature {
    fn overlay(ctx: &mut FeatureContext<'_>, extra: &str) -> NodeId {
        let class = format!("{} {} {}", ctx.class("overlay"), ctx.class("layer"), extra);
        let layer = ctx.doc.create_child(ctx.nodes.layers, "div", &class);
        ctx.doc.set_display(layer, false);
        layer
    }

    fn buffering(ctx: &FeatureContext<'_>) -> Option<NodeId> {
        ctx.doc.find_by_class(ctx.nodes.controls, &ctx.class("time-buffering"))
    }

    fn set_loading(&self, ctx: &mut FeatureContext<'_>, shown: bool) {
        if let Some(loading) = self.loading {
            ctx.doc.set_display(loading, shown);
        }
        if let Some(buffering) = Self::buffering(ctx) {
            ctx.doc.set_display(buffering, shown);
        }
    }
}

impl Feature for OverlaysFeature {
    fn build(&mut self, ctx: &mut FeatureContext<'_>) -> Result<()> {
        if !ctx.view.is_video {
            return Ok(());
        }

        let loading = Self::overlay(ctx, "");
        let spinner_class = ctx.class("overlay-loading");
        let spinner = ctx.doc.create_child(loading, "div", &spinner_class);
        let spinner_img_class = ctx.class("overlay-loading-bg-img");
        ctx.doc.create_child(spinner, "span", &spinner_img_class);
        self.loading = Some(loading);

        let error = Self::overlay(ctx, "");
        let message_class = ctx.class("overlay-error");
        self.error_message = Some(ctx.doc.create_child(error, "div", &message_class));
        self.error = Some(error);

        let play_class = ctx.class("overlay-play");
        let big_play = Self::overlay(ctx, &play_class);
        ctx.doc.set_style(big_play, "display", "");
        let button_class = ctx.class("overlay-button");
        let button = ctx.doc.create_child(big_play, "div", &button_class);
        ctx.doc.set_attr(button, "role", "button");
        ctx.doc.set_attr(button, "tabindex", "0");
        ctx.doc.set_attr(button, "aria-label", "Play");
        ctx.doc.set_attr(button, "aria-pressed", "false");
        self.big_play = Some(big_play);
        self.big_play_button = Some(button);
        self.click = Some(ctx.listen(EventTarget::Node(big_play), DomEventKind::Click));

        let renderer = ctx.media.renderer_name().unwrap_or_default();
        let no_poster = ctx.config.poster.is_empty() && !ctx.doc.has_attr(ctx.nodes.media_node, "poster");
        let embedded = renderer.contains("youtube") || renderer.contains("facebook");
        if (embedded && no_poster) || ctx.config.platform.stock_android {
            ctx.doc.set_display(big_play, false);
        }
        Ok(())
    }

    fn clean(&mut self, ctx: &mut FeatureContext<'_>) -> Result<()> {
        if let Some(click) = self.click.take() {
            ctx.unlisten(click);
        }
        for layer in [self.loading.take(), self.error.take(), self.big_play.take()].into_iter().flatten() {
            ctx.doc.detach(layer);
        }
        Ok(())
    }

    fn on_media_event(&mut self, ctx: &mut FeatureContext<'_>, event: &MediaEvent) {
        let (Some(big_play), Some(error)) = (self.big_play, self.error) else {
            return;
        };
        match event {
            MediaEvent::Play | MediaEvent::Playing => {
                ctx.doc.set_display(big_play, false);
                self.set_loading(ctx, false);
                ctx.doc.set_display(error, false);
                if let Some(button) = self.big_play_button {
                    ctx.doc.set_attr(button, "aria-pressed", "true");
                }
            }
            MediaEvent::Seeking | MediaEvent::Waiting | MediaEvent::LoadedData => self.set_loading(ctx, true),
            MediaEvent::Seeked | MediaEvent::CanPlay => self.set_loading(ctx, false),
            MediaEvent::Pause => {
                if !ctx.config.platform.stock_android {
                    ctx.doc.set_display(big_play, true);
                }
                if let Some(button) = self.big_play_button {
                    ctx.doc.set_attr(button, "aria-pressed", "false");
                }
            }
            MediaEvent::Error(e) => {
                self.set_loading(ctx, false);
                ctx.doc.set_display(big_play, false);
                ctx.doc.set_display(error, true);
                if let Some(message) = self.error_message {
                    ctx.doc.set_text(message, e.message.clone());
                }
            }
            _ => {}
        }
    }

    fn on_dom_event(&mut self, ctx: &mut FeatureContext<'_>, listener: ListenerId, _event: &DomEvent) {
        if Some(listener) == self.click && ctx.config.click_to_play_pause {
            ctx.request(PlayerCommand::TogglePlayback);
        }
    }
}
