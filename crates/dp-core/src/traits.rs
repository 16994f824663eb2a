use crate::frame::{AudioFrame, DirectionEvent};

/// Fournit la dernière frame audio complète au tracker.
///
/// Implémenté par : `FrameReceiver` (capture cpal), sources de test.
///
/// # Example
/// ```
/// use dp_core::traits::FrameSource;
/// use dp_core::frame::AudioFrame;
///
/// struct Once(Option<AudioFrame>, AudioFrame);
/// impl FrameSource for Once {
///     fn latest(&mut self) -> Option<&AudioFrame> {
///         let next = self.0.take()?;
///         self.1 = next;
///         Some(&self.1)
///     }
/// }
/// ```
pub trait FrameSource {
    /// Next unread frame, or `None` if the producer has not published one since the last call.
    ///
    /// Ne bloque JAMAIS.
    fn latest(&mut self) -> Option<&AudioFrame>;
}

/// Receives accepted direction events and performs the out-of-process action.
///
/// The tracker ignores the returned error beyond logging it: classifier and
/// cooldown state are already committed when `dispatch` is called.
///
/// # Example
/// ```
/// use dp_core::traits::CommandDispatcher;
/// use dp_core::frame::DirectionEvent;
///
/// struct Null;
/// impl CommandDispatcher for Null {
///     fn dispatch(&mut self, _event: &DirectionEvent) -> anyhow::Result<()> { Ok(()) }
///     fn name(&self) -> &'static str { "null" }
/// }
/// ```
pub trait CommandDispatcher: Send {
    /// Hand the event off.
    ///
    /// # Errors
    /// Implementation-specific delivery failure.
    fn dispatch(&mut self, event: &DirectionEvent) -> anyhow::Result<()>;

    /// Nom lisible pour les logs.
    fn name(&self) -> &'static str;
}

impl<D: CommandDispatcher + ?Sized> CommandDispatcher for Box<D> {
    fn dispatch(&mut self, event: &DirectionEvent) -> anyhow::Result<()> {
        (**self).dispatch(event)
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}
