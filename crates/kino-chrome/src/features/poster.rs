//! Poster layer

use crate::dom::{Document, NodeId};
use crate::media::MediaEvent;
use crate::Result;

use super::{Feature, FeatureContext};

#[derive(Debug, Default)]
pub struct PosterFeature {
    layer: Option<NodeId>,
}

/// Point `poster` (the poster layer) at `url`, creating its image if needed
pub fn apply_poster(doc: &mut Document, poster: NodeId, url: &str, prefix: &str) {
    let img_class = format!("{}poster-img", prefix);
    let img = match doc.find_by_class(poster, &img_class) {
        Some(img) => img,
        None => {
            let img = doc.create_child(poster, "img", &img_class);
            doc.set_attr(img, "width", "100%");
            doc.set_attr(img, "height", "100%");
            img
        }
    };
    doc.set_attr(img, "src", url);
    doc.set_style(poster, "background-image", format!("url(\"{}\")", url));
}

impl Feature for PosterFeature {
    fn build(&mut self, ctx: &mut FeatureContext<'_>) -> Result<()> {
        let class = format!("{} {}", ctx.class("poster"), ctx.class("layer"));
        let layer = ctx.doc.create_child(ctx.nodes.layers, "div", &class);

        let url = if ctx.config.poster.is_empty() {
            ctx.doc.attr(ctx.nodes.media_node, "poster").unwrap_or_default().to_string()
        } else {
            ctx.config.poster.clone()
        };

        if url.is_empty() {
            ctx.doc.set_display(layer, false);
        } else {
            apply_poster(ctx.doc, layer, &url, &ctx.config.class_prefix);
        }
        self.layer = Some(layer);
        Ok(())
    }

    fn clean(&mut self, ctx: &mut FeatureContext<'_>) -> Result<()> {
        if let Some(layer) = self.layer.take() {
            ctx.doc.detach(layer);
        }
        Ok(())
    }

    fn on_media_event(&mut self, ctx: &mut FeatureContext<'_>, event: &MediaEvent) {
        let Some(layer) = self.layer else { return };
        let shown = match event {
            MediaEvent::Play | MediaEvent::Playing | MediaEvent::Error(_) => false,
            MediaEvent::Ended if ctx.config.show_poster_when_ended && ctx.config.auto_rewind => true,
            MediaEvent::Pause if ctx.config.show_poster_when_paused && !ctx.media.ended() => true,
            _ => return,
        };
        ctx.doc.set_display(layer, shown);
    }
}
