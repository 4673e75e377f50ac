//! Control bar features

use crate::command::PlayerCommand;
use crate::dom::{DomEvent, DomEventKind, EventTarget, ListenerId, NodeId};
use crate::media::MediaEvent;
use crate::timefmt::seconds_to_timecode;
use crate::Result;

use super::{Feature, FeatureContext};

fn remove_control(ctx: &mut FeatureContext<'_>, node: Option<NodeId>, listener: Option<ListenerId>) {
    if let Some(listener) = listener {
        ctx.unlisten(listener);
    }
    if let Some(node) = node {
        ctx.doc.detach(node);
    }
}

/// Play/pause toggle
#[derive(Debug, Default)]
pub struct PlayPauseFeature {
    wrapper: Option<NodeId>,
    button: Option<NodeId>,
    click: Option<ListenerId>,
}

impl PlayPauseFeature {
    fn set_state(&self, ctx: &mut FeatureContext<'_>, state: &str, label: &str) {
        let (Some(wrapper), Some(button)) = (self.wrapper, self.button) else {
            return;
        };
        let all = format!("{} {} {}", ctx.class("play"), ctx.class("pause"), ctx.class("replay"));
        let class = ctx.class(state);
        ctx.doc.remove_class(wrapper, &all);
        ctx.doc.add_class(wrapper, &class);
        ctx.doc.set_attr(button, "aria-label", label);
        ctx.doc.set_attr(button, "title", label);
    }
}

impl Feature for PlayPauseFeature {
    fn build(&mut self, ctx: &mut FeatureContext<'_>) -> Result<()> {
        let classes = format!("{} {}", ctx.class("playpause-button"), ctx.class("play"));
        let (wrapper, button) = ctx.create_button(&classes, "Play");
        ctx.add_control_element(wrapper, "playpause");
        self.click = Some(ctx.listen(EventTarget::Node(button), DomEventKind::Click));
        self.wrapper = Some(wrapper);
        self.button = Some(button);
        Ok(())
    }

    fn clean(&mut self, ctx: &mut FeatureContext<'_>) -> Result<()> {
        self.button = None;
        remove_control(ctx, self.wrapper.take(), self.click.take());
        Ok(())
    }

    fn on_media_event(&mut self, ctx: &mut FeatureContext<'_>, event: &MediaEvent) {
        match event {
            MediaEvent::Play | MediaEvent::Playing => self.set_state(ctx, "pause", "Pause"),
            MediaEvent::Pause if !ctx.media.ended() => self.set_state(ctx, "play", "Play"),
            MediaEvent::Ended => self.set_state(ctx, "replay", "Play"),
            _ => {}
        }
    }

    fn on_dom_event(&mut self, ctx: &mut FeatureContext<'_>, listener: ListenerId, _event: &DomEvent) {
        if Some(listener) == self.click {
            ctx.request(PlayerCommand::TogglePlayback);
        }
    }
}

/// Current time display
#[derive(Debug, Default)]
pub struct CurrentTimeFeature {
    wrapper: Option<NodeId>,
    text: Option<NodeId>,
}

impl Feature for CurrentTimeFeature {
    fn build(&mut self, ctx: &mut FeatureContext<'_>) -> Result<()> {
        let wrapper_class = ctx.class("time");
        let wrapper = ctx.doc.create_element("div");
        ctx.doc.add_class(wrapper, &wrapper_class);
        let text_class = ctx.class("currenttime");
        let text = ctx.doc.create_child(wrapper, "span", &text_class);
        let initial = seconds_to_timecode(0.0, &ctx.view.time_format, ctx.view.frames_per_second);
        ctx.doc.set_text(text, initial);
        ctx.add_control_element(wrapper, "current");
        self.wrapper = Some(wrapper);
        self.text = Some(text);
        Ok(())
    }

    fn clean(&mut self, ctx: &mut FeatureContext<'_>) -> Result<()> {
        self.text = None;
        remove_control(ctx, self.wrapper.take(), None);
        Ok(())
    }

    fn on_media_event(&mut self, ctx: &mut FeatureContext<'_>, event: &MediaEvent) {
        let Some(text) = self.text else { return };
        if matches!(event, MediaEvent::TimeUpdate | MediaEvent::LoadedMetadata | MediaEvent::Seeked) {
            let formatted =
                seconds_to_timecode(ctx.media.current_time(), &ctx.view.time_format, ctx.view.frames_per_second);
            ctx.doc.set_text(text, formatted);
        }
    }
}

/// Duration display
#[derive(Debug, Default)]
pub struct DurationFeature {
    wrapper: Option<NodeId>,
    text: Option<NodeId>,
}

impl Feature for DurationFeature {
    fn build(&mut self, ctx: &mut FeatureContext<'_>) -> Result<()> {
        let wrapper_class = format!("{} {}", ctx.class("time"), ctx.class("duration-container"));
        let wrapper = ctx.doc.create_element("div");
        ctx.doc.add_class(wrapper, &wrapper_class);
        let text_class = ctx.class("duration");
        let text = ctx.doc.create_child(wrapper, "span", &text_class);
        let initial = seconds_to_timecode(0.0, &ctx.view.time_format, ctx.view.frames_per_second);
        ctx.doc.set_text(text, initial);
        ctx.add_control_element(wrapper, "duration");
        self.wrapper = Some(wrapper);
        self.text = Some(text);
        Ok(())
    }

    fn clean(&mut self, ctx: &mut FeatureContext<'_>) -> Result<()> {
        self.text = None;
        remove_control(ctx, self.wrapper.take(), None);
        Ok(())
    }

    fn on_media_event(&mut self, ctx: &mut FeatureContext<'_>, event: &MediaEvent) {
        let Some(text) = self.text else { return };
        if matches!(event, MediaEvent::TimeUpdate | MediaEvent::LoadedMetadata) {
            let formatted =
                seconds_to_timecode(ctx.media.duration(), &ctx.view.time_format, ctx.view.frames_per_second);
            ctx.doc.set_text(text, formatted);
        }
    }
}

/// Time rail with buffering, loaded and current bars
#[derive(Debug, Default)]
pub struct ProgressFeature {
    rail: Option<NodeId>,
    total: Option<NodeId>,
    current: Option<NodeId>,
    handle: Option<NodeId>,
    click: Option<ListenerId>,
}

impl ProgressFeature {
    fn set_current_rail(&self, ctx: &mut FeatureContext<'_>) {
        let (Some(current), Some(handle)) = (self.current, self.handle) else {
            return;
        };
        let duration = ctx.media.duration();
        let percent = if duration.is_finite() && duration > 0.0 {
            (ctx.media.current_time() / duration * 100.0).clamp(0.0, 100.0)
        } else {
            0.0
        };
        ctx.doc.set_style(current, "width", format!("{:.2}%", percent));
        ctx.doc.set_style(handle, "left", format!("{:.2}%", percent));
    }
}

impl Feature for ProgressFeature {
    fn build(&mut self, ctx: &mut FeatureContext<'_>) -> Result<()> {
        let rail_class = ctx.class("time-rail");
        let rail = ctx.doc.create_element("div");
        ctx.doc.add_class(rail, &rail_class);

        let total_class = format!("{} {}", ctx.class("time-total"), ctx.class("time-slider"));
        let total = ctx.doc.create_child(rail, "span", &total_class);
        for part in ["time-buffering", "time-loaded", "time-current", "time-handle"] {
            let class = ctx.class(part);
            let node = ctx.doc.create_child(total, "span", &class);
            match part {
                "time-buffering" => ctx.doc.set_display(node, false),
                "time-current" => self.current = Some(node),
                "time-handle" => self.handle = Some(node),
                _ => {}
            }
        }
        ctx.add_control_element(rail, "progress");
        self.click = Some(ctx.listen(EventTarget::Node(total), DomEventKind::Click));
        self.rail = Some(rail);
        self.total = Some(total);
        ctx.request(PlayerCommand::RegisterRail { rail, total });
        Ok(())
    }

    fn clean(&mut self, ctx: &mut FeatureContext<'_>) -> Result<()> {
        self.total = None;
        self.current = None;
        self.handle = None;
        remove_control(ctx, self.rail.take(), self.click.take());
        ctx.request(PlayerCommand::ClearRail);
        Ok(())
    }

    fn on_media_event(&mut self, ctx: &mut FeatureContext<'_>, event: &MediaEvent) {
        if matches!(
            event,
            MediaEvent::TimeUpdate | MediaEvent::Seeked | MediaEvent::LoadedMetadata | MediaEvent::Ended
        ) {
            self.set_current_rail(ctx);
        }
    }

    fn on_dom_event(&mut self, ctx: &mut FeatureContext<'_>, listener: ListenerId, event: &DomEvent) {
        let Some(total) = self.total.filter(|_| Some(listener) == self.click) else {
            return;
        };
        let duration = ctx.media.duration();
        let width = ctx.doc.measured_size(total).0;
        let Some(offset) = event.offset_x else { return };
        if duration.is_finite() && duration > 0.0 && width > 0.0 {
            let position = (offset / width).clamp(0.0, 1.0) * duration;
            ctx.request(PlayerCommand::SeekTo(position));
        }
    }
}

/// Mute button and volume slider
#[derive(Debug, Default)]
pub struct VolumeFeature {
    wrapper: Option<NodeId>,
    slider: Option<NodeId>,
    current: Option<NodeId>,
    click: Option<ListenerId>,
}

impl VolumeFeature {
    fn refresh(&self, ctx: &mut FeatureContext<'_>) {
        let Some(wrapper) = self.wrapper else { return };
        let classes = format!("{} {}", ctx.class("mute"), ctx.class("unmute"));
        let state = ctx.class(if ctx.media.muted() { "unmute" } else { "mute" });
        ctx.doc.remove_class(wrapper, &classes);
        ctx.doc.add_class(wrapper, &state);
        if let Some(current) = self.current {
            let volume = if ctx.media.muted() { 0.0 } else { ctx.media.volume() };
            ctx.doc.set_style(current, "height", format!("{}%", (volume * 100.0).round()));
        }
    }
}

impl Feature for VolumeFeature {
    fn build(&mut self, ctx: &mut FeatureContext<'_>) -> Result<()> {
        let classes = format!("{} {}", ctx.class("volume-button"), ctx.class("mute"));
        let (wrapper, button) = ctx.create_button(&classes, "Mute");

        let slider_class = ctx.class("volume-slider");
        let slider = ctx.doc.create_child(wrapper, "div", &slider_class);
        ctx.doc.set_display(slider, false);
        let total_class = ctx.class("volume-total");
        let total = ctx.doc.create_child(slider, "div", &total_class);
        let current_class = ctx.class("volume-current");
        let current = ctx.doc.create_child(total, "div", &current_class);

        ctx.add_control_element(wrapper, "volume");
        self.click = Some(ctx.listen(EventTarget::Node(button), DomEventKind::Click));
        self.wrapper = Some(wrapper);
        self.slider = Some(slider);
        self.current = Some(current);

        ctx.media.set_volume(ctx.config.start_volume);
        ctx.request(PlayerCommand::RegisterVolumeSlider(slider));
        self.refresh(ctx);
        Ok(())
    }

    fn clean(&mut self, ctx: &mut FeatureContext<'_>) -> Result<()> {
        self.slider = None;
        self.current = None;
        remove_control(ctx, self.wrapper.take(), self.click.take());
        Ok(())
    }

    fn on_media_event(&mut self, ctx: &mut FeatureContext<'_>, event: &MediaEvent) {
        if matches!(event, MediaEvent::VolumeChange | MediaEvent::LoadedMetadata) {
            self.refresh(ctx);
        }
    }

    fn on_dom_event(&mut self, ctx: &mut FeatureContext<'_>, listener: ListenerId, _event: &DomEvent) {
        if Some(listener) == self.click {
            ctx.request(PlayerCommand::ToggleMute);
        }
    }
}

/// Fullscreen toggle (video only)
#[derive(Debug, Default)]
pub struct FullscreenFeature {
    wrapper: Option<NodeId>,
    click: Option<ListenerId>,
}

impl Feature for FullscreenFeature {
    fn build(&mut self, ctx: &mut FeatureContext<'_>) -> Result<()> {
        if !ctx.view.is_video {
            return Ok(());
        }
        let classes = format!("{} {}", ctx.class("fullscreen-button"), ctx.class("fullscreen"));
        let (wrapper, button) = ctx.create_button(&classes, "Fullscreen");
        ctx.add_control_element(wrapper, "fullscreen");
        self.click = Some(ctx.listen(EventTarget::Node(button), DomEventKind::Click));
        self.wrapper = Some(wrapper);
        ctx.request(PlayerCommand::RegisterFullscreen);
        Ok(())
    }

    fn clean(&mut self, ctx: &mut FeatureContext<'_>) -> Result<()> {
        remove_control(ctx, self.wrapper.take(), self.click.take());
        Ok(())
    }

    fn on_dom_event(&mut self, ctx: &mut FeatureContext<'_>, listener: ListenerId, _event: &DomEvent) {
        if Some(listener) == self.click {
            ctx.request(PlayerCommand::ToggleFullscreen);
        }
    }
}
