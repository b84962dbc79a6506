//! Metadata keys written by the declaration builders and read during
//! registration.

use tether_core::MetadataKey;

use crate::declare::{CommandMutator, MethodHandler, Registration};
use crate::interceptor::{InterceptorCaster, InterceptorRegistration};
use crate::selector::ScopeFn;
use crate::wire::WireBinding;

/// Scope-narrowing functions, on classes and members. Array slot.
pub const ON_CONTEXT_SCOPE: MetadataKey<ScopeFn> = MetadataKey::new("tether:on_context_scope");

/// The registration descriptor of a member. Single slot.
pub const DO_REGISTER: MetadataKey<Registration> = MetadataKey::new("tether:do_register");

/// The erased handler of a member. Single slot.
pub const METHOD_HANDLER: MetadataKey<MethodHandler> = MetadataKey::new("tether:method_handler");

/// Command mutators, on classes and members. Array slot.
pub const COMMAND_DEFINITION: MetadataKey<CommandMutator> =
    MetadataKey::new("tether:command_definition");

/// Interceptor registrations, on classes and members. Array slot.
pub const COMMAND_INTERCEPTORS: MetadataKey<InterceptorRegistration> =
    MetadataKey::new("tether:command_interceptors");

/// Capability names a class provides. Array slot.
pub const SERVICE_PROVIDE: MetadataKey<String> = MetadataKey::new("tether:service_provide");

/// Service wire bindings of a class. Array slot.
pub const SERVICE_WIRE: MetadataKey<WireBinding> = MetadataKey::new("tether:service_wire");

/// Casts an instance of the class to an interceptor. Single slot.
pub const INTERCEPTOR_CAST: MetadataKey<InterceptorCaster> =
    MetadataKey::new("tether:interceptor_cast");

/// Registration points of a class, in declaration order. Array slot.
pub const MEMBERS: MetadataKey<&'static str> = MetadataKey::new("tether:members");
